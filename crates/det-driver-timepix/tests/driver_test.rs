//! End-to-end driver tests against a scripted endpoint.
//!
//! Every test builds a full `TimepixDriver` over a `MockEndpoint` and
//! drives it through the public parameter-write surface only.

use det_core::params::{ids, ParamValue};
use det_core::{AcquisitionState, DetError};
use det_driver_timepix::endpoint::CommandVocabulary;
use det_driver_timepix::mock::MockEndpoint;
use det_driver_timepix::{DriverConfig, TimepixDriver, DRIVER_VERSION};
use std::sync::Arc;

const URL: &str = "http://detector:8080";
const DASHBOARD: &str = "/dashboard";
const START: &str = "/measurement/start";
const STOP: &str = "/measurement/stop";

fn config() -> DriverConfig {
    DriverConfig::new("det1", URL)
}

fn live_endpoint() -> Arc<MockEndpoint> {
    Arc::new(MockEndpoint::new().with_response(
        DASHBOARD,
        200,
        r#"{"manufacturer":"ASI","model":"TPX3","serial":"W0042","firmware":"2.3.1","width":448,"height":512}"#,
    ))
}

async fn live_driver() -> (TimepixDriver, Arc<MockEndpoint>) {
    let mock = live_endpoint();
    let driver = TimepixDriver::new_async(config(), mock.clone())
        .await
        .unwrap();
    (driver, mock)
}

#[tokio::test]
async fn construction_probes_and_pulls_identity() {
    let (driver, mock) = live_driver().await;

    assert!(driver.is_connected());
    assert_eq!(driver.last_status_code(), Some(200));
    assert_eq!(mock.request_count("/"), 1);
    assert_eq!(mock.request_count(DASHBOARD), 1);

    let cache = driver.cache();
    assert_eq!(cache.get_int(ids::HTTP_CODE).unwrap(), 200);
    assert_eq!(cache.get_text(ids::MODEL).unwrap(), "TPX3");
    assert_eq!(cache.get_int(ids::SIZE_X).unwrap(), 448);
    assert_eq!(cache.get_int(ids::SIZE_Y).unwrap(), 512);
    assert_eq!(cache.get_text(ids::SERVER_URL).unwrap(), URL);
    assert_eq!(cache.get_text(ids::DRIVER_VERSION).unwrap(), DRIVER_VERSION);
}

#[tokio::test]
async fn failed_probe_skips_identity_refresh() {
    let mock = Arc::new(MockEndpoint::new().with_response("/", 503, "down"));
    let driver = TimepixDriver::new_async(config(), mock.clone())
        .await
        .unwrap();

    assert!(!driver.is_connected());
    assert_eq!(driver.last_status_code(), Some(503));
    assert_eq!(driver.cache().get_int(ids::HTTP_CODE).unwrap(), 503);
    assert_eq!(mock.request_count(DASHBOARD), 0);
}

#[tokio::test]
async fn unreachable_server_records_zero_status() {
    let mock = Arc::new(MockEndpoint::new().with_unreachable("/"));
    let driver = TimepixDriver::new_async(config(), mock).await.unwrap();

    assert!(!driver.is_connected());
    assert_eq!(driver.last_status_code(), None);
    assert_eq!(driver.cache().get_int(ids::HTTP_CODE).unwrap(), 0);
}

#[tokio::test]
async fn acquire_write_starts_and_stops_acquisition() {
    let (mut driver, mock) = live_driver().await;

    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    assert_eq!(driver.acquisition_state(), AcquisitionState::Acquiring);
    assert_eq!(mock.request_count(START), 1);

    driver.write_int(ids::ACQUIRE, 0).await.unwrap();
    assert_eq!(driver.acquisition_state(), AcquisitionState::Idle);
    assert_eq!(mock.request_count(STOP), 1);

    let cache = driver.cache();
    assert_eq!(cache.get_int(ids::ACQUIRE).unwrap(), 0);
    assert_eq!(cache.get_int(ids::DETECTOR_STATE).unwrap(), 0);
}

#[tokio::test]
async fn redundant_acquire_writes_are_idempotent() {
    let (mut driver, mock) = live_driver().await;

    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    assert_eq!(mock.request_count(START), 1);

    driver.write_int(ids::ACQUIRE, 0).await.unwrap();
    driver.write_int(ids::ACQUIRE, 0).await.unwrap();
    assert_eq!(mock.request_count(STOP), 1);
}

#[tokio::test]
async fn begin_failure_surfaces_error_and_stays_idle() {
    let mock = Arc::new(
        MockEndpoint::new()
            .with_response(DASHBOARD, 200, "{}")
            .with_response(START, 409, "detector busy"),
    );
    let mut driver = TimepixDriver::new_async(config(), mock).await.unwrap();

    let err = driver.write_int(ids::ACQUIRE, 1).await.unwrap_err();
    assert!(matches!(err, DetError::CommandFailure { .. }));
    assert_eq!(driver.acquisition_state(), AcquisitionState::Idle);

    // The stored intent is visible even though the action failed.
    let cache = driver.cache();
    assert_eq!(cache.get_int(ids::ACQUIRE).unwrap(), 1);
    assert_eq!(cache.get_int(ids::DETECTOR_STATE).unwrap(), 0);
}

#[tokio::test]
async fn acquire_fails_when_never_connected() {
    let mock = Arc::new(MockEndpoint::new().with_response("/", 500, ""));
    let mut driver = TimepixDriver::new_async(config(), mock.clone())
        .await
        .unwrap();

    assert!(driver.write_int(ids::ACQUIRE, 1).await.is_err());
    assert_eq!(driver.acquisition_state(), AcquisitionState::Idle);
    assert_eq!(mock.request_count(START), 0);
}

#[tokio::test]
async fn image_mode_write_stops_running_acquisition() {
    let (mut driver, mock) = live_driver().await;

    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    driver.write_int(ids::IMAGE_MODE, 2).await.unwrap();

    assert_eq!(driver.acquisition_state(), AcquisitionState::Idle);
    assert_eq!(mock.request_count(STOP), 1);
    assert_eq!(driver.cache().get_int(ids::IMAGE_MODE).unwrap(), 2);
    assert_eq!(driver.cache().get_int(ids::ACQUIRE).unwrap(), 0);
}

#[tokio::test]
async fn image_mode_write_while_idle_issues_no_command() {
    let (mut driver, mock) = live_driver().await;

    driver.write_int(ids::IMAGE_MODE, 1).await.unwrap();

    assert_eq!(mock.request_count(STOP), 0);
    assert_eq!(driver.cache().get_int(ids::IMAGE_MODE).unwrap(), 1);
}

#[tokio::test]
async fn exposure_write_stops_running_acquisition() {
    let (mut driver, mock) = live_driver().await;

    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    driver.write_float(ids::ACQUIRE_TIME, 0.25).await.unwrap();

    assert_eq!(driver.acquisition_state(), AcquisitionState::Idle);
    assert_eq!(mock.request_count(STOP), 1);
    assert!((driver.cache().get_float(ids::ACQUIRE_TIME).unwrap() - 0.25).abs() < f64::EPSILON);
}

#[tokio::test]
async fn stop_forces_idle_when_device_unreachable() {
    let mock = Arc::new(
        MockEndpoint::new()
            .with_response(DASHBOARD, 200, "{}")
            .with_unreachable(STOP),
    );
    let mut driver = TimepixDriver::new_async(config(), mock).await.unwrap();

    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    driver.write_int(ids::ACQUIRE, 0).await.unwrap();

    assert_eq!(driver.acquisition_state(), AcquisitionState::Idle);
    assert_eq!(driver.cache().get_int(ids::ACQUIRE).unwrap(), 0);
    assert_eq!(driver.cache().get_int(ids::DETECTOR_STATE).unwrap(), 0);
}

#[tokio::test]
async fn type_mismatch_is_rejected_but_still_published() {
    let (mut driver, _mock) = live_driver().await;
    let rx = driver.subscribe();

    let err = driver.write_float(ids::ACQUIRE, 1.0).await.unwrap_err();
    assert!(matches!(err, DetError::TypeMismatch { .. }));

    // The failed write still produced a fresh snapshot.
    assert_eq!(
        rx.borrow().get(&ids::ACQUIRE),
        Some(&ParamValue::Int(0))
    );
}

#[tokio::test]
async fn unknown_driver_parameter_is_rejected() {
    let (mut driver, _mock) = live_driver().await;

    let err = driver.write_int(999, 1).await.unwrap_err();
    assert!(matches!(err, DetError::UnknownParameter { id: 999 }));
}

#[tokio::test]
async fn below_range_ids_are_delegated_without_error() {
    let (mut driver, mock) = live_driver().await;

    driver.write_int(7, 42).await.unwrap();
    driver.write_float(8, 3.5).await.unwrap();
    driver.write_text(9, "hello").await.unwrap();

    // Delegated writes never reach the device.
    assert_eq!(mock.request_count(START), 0);
    assert_eq!(mock.request_count(STOP), 0);
}

#[tokio::test]
async fn snapshot_tracks_acquisition_state() {
    let (mut driver, _mock) = live_driver().await;
    let rx = driver.subscribe();

    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    {
        let snapshot = rx.borrow();
        assert_eq!(snapshot.get(&ids::ACQUIRE), Some(&ParamValue::Int(1)));
        assert_eq!(snapshot.get(&ids::DETECTOR_STATE), Some(&ParamValue::Int(1)));
    }

    driver.write_int(ids::ACQUIRE, 0).await.unwrap();
    let snapshot = rx.borrow();
    assert_eq!(snapshot.get(&ids::ACQUIRE), Some(&ParamValue::Int(0)));
    assert_eq!(snapshot.get(&ids::DETECTOR_STATE), Some(&ParamValue::Int(0)));
}

#[tokio::test]
async fn custom_vocabulary_routes_commands() {
    let vocab = CommandVocabulary {
        dashboard: "/api/v1/info".to_string(),
        begin_acquisition: "/api/v1/acquire".to_string(),
        end_acquisition: "/api/v1/halt".to_string(),
    };
    let mock = Arc::new(MockEndpoint::new().with_response("/api/v1/info", 200, "{}"));
    let mut driver = TimepixDriver::with_vocabulary(config(), mock.clone(), vocab)
        .await
        .unwrap();

    assert_eq!(mock.request_count("/api/v1/info"), 1);

    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    driver.write_int(ids::ACQUIRE, 0).await.unwrap();
    assert_eq!(mock.request_count("/api/v1/acquire"), 1);
    assert_eq!(mock.request_count("/api/v1/halt"), 1);
}

#[tokio::test]
async fn refresh_updates_identity_on_demand() {
    let mock = Arc::new(MockEndpoint::new().with_response(DASHBOARD, 200, "{}"));
    let mut driver = TimepixDriver::new_async(config(), mock.clone())
        .await
        .unwrap();
    assert_eq!(driver.cache().get_text(ids::MODEL).unwrap(), "");

    mock.set_response(DASHBOARD, 200, r#"{"model":"TPX3-updated"}"#);
    driver.refresh().await.unwrap();

    assert_eq!(driver.cache().get_text(ids::MODEL).unwrap(), "TPX3-updated");
}

#[tokio::test]
async fn unnamed_instance_is_rejected() {
    let mock = Arc::new(MockEndpoint::new());
    let result = TimepixDriver::new_async(DriverConfig::new("", URL), mock).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn empty_url_skips_probe_entirely() {
    let mock = Arc::new(MockEndpoint::new());
    let driver = TimepixDriver::new_async(DriverConfig::new("det1", ""), mock.clone())
        .await
        .unwrap();

    assert!(!driver.is_connected());
    assert_eq!(mock.request_count("/"), 0);
}

#[tokio::test]
async fn shutdown_stops_acquisition_and_disconnects() {
    let (mut driver, mock) = live_driver().await;

    driver.write_int(ids::ACQUIRE, 1).await.unwrap();
    driver.shutdown().await.unwrap();

    assert_eq!(driver.acquisition_state(), AcquisitionState::Idle);
    assert!(!driver.is_connected());
    assert_eq!(mock.request_count(STOP), 1);
}

#[tokio::test]
async fn report_renders_device_block() {
    let (driver, _mock) = live_driver().await;

    let mut out = String::new();
    driver.report(&mut out, 1);

    assert!(out.contains("Connected Device Information (det1)"));
    assert!(out.contains("448"));
    assert!(out.contains("512"));
}
