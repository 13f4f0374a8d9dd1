//! Identity/telemetry refresh.
//!
//! Queries the dashboard sub-path and populates the identity parameters.
//! This is advisory telemetry, not control: when the device is not marked
//! connected the refresh is a no-op that still reports success, and a
//! failed refresh never touches the acquisition state.

use crate::components::connection::DeviceConnection;
use crate::endpoint::{CommandVocabulary, EndpointClient};
use det_core::params::{ids, ParameterCache};
use det_core::{DetError, DetResult};
use serde::Deserialize;

/// Identity/telemetry document served by the dashboard query.
///
/// The field set is device-specific and open-ended; unknown fields are
/// ignored, absent fields leave the corresponding parameter untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Dashboard {
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "serial")]
    pub serial_number: Option<String>,
    #[serde(default, alias = "firmware")]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

/// Fetch the dashboard and update the identity parameters.
pub async fn refresh_dashboard(
    connection: &DeviceConnection,
    client: &dyn EndpointClient,
    vocab: &CommandVocabulary,
    cache: &mut ParameterCache,
) -> DetResult<()> {
    if !connection.is_connected() {
        tracing::debug!("device not connected, skipping telemetry refresh");
        return Ok(());
    }

    tracing::debug!("collecting detector information");

    let response =
        client
            .get(&vocab.dashboard)
            .await
            .map_err(|e| DetError::ConnectionFailure {
                url: vocab.dashboard.clone(),
                reason: e.to_string(),
            })?;

    if !response.is_success() {
        return Err(DetError::ConnectionFailure {
            url: vocab.dashboard.clone(),
            reason: format!("status {}", response.status),
        });
    }

    let dashboard: Dashboard =
        serde_json::from_str(&response.body).map_err(|e| DetError::Decode {
            what: "dashboard",
            reason: e.to_string(),
        })?;

    if let Some(manufacturer) = &dashboard.manufacturer {
        cache.set_text(ids::MANUFACTURER, manufacturer)?;
    }
    if let Some(model) = &dashboard.model {
        cache.set_text(ids::MODEL, model)?;
    }
    if let Some(serial) = &dashboard.serial_number {
        cache.set_text(ids::SERIAL_NUMBER, serial)?;
    }
    if let Some(firmware) = &dashboard.firmware_version {
        cache.set_text(ids::FIRMWARE_VERSION, firmware)?;
    }
    if let Some(width) = dashboard.width {
        cache.set_int(ids::SIZE_X, width)?;
    }
    if let Some(height) = dashboard.height {
        cache.set_int(ids::SIZE_Y, height)?;
    }

    cache.publish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEndpoint;
    use det_core::params::ParamValue;

    fn identity_cache() -> ParameterCache {
        let mut cache = ParameterCache::new();
        cache.create(ids::HTTP_CODE, ParamValue::Int(0));
        cache.create(ids::MANUFACTURER, ParamValue::Text(String::new()));
        cache.create(ids::MODEL, ParamValue::Text(String::new()));
        cache.create(ids::SERIAL_NUMBER, ParamValue::Text(String::new()));
        cache.create(ids::FIRMWARE_VERSION, ParamValue::Text(String::new()));
        cache.create(ids::SIZE_X, ParamValue::Int(0));
        cache.create(ids::SIZE_Y, ParamValue::Int(0));
        cache
    }

    async fn connected(mock: &MockEndpoint, cache: &mut ParameterCache) -> DeviceConnection {
        let mut conn = DeviceConnection::new("http://detector:8080");
        conn.probe(mock, cache).await.unwrap();
        conn
    }

    #[tokio::test]
    async fn refresh_populates_identity_parameters() {
        let mock = MockEndpoint::new().with_response("/", 200, "").with_response(
            "/dashboard",
            200,
            r#"{"manufacturer":"ASI","model":"TPX3","serial":"W0042","firmware":"2.3.1","width":448,"height":512}"#,
        );
        let mut cache = identity_cache();
        let conn = connected(&mock, &mut cache).await;

        refresh_dashboard(&conn, &mock, &CommandVocabulary::default(), &mut cache)
            .await
            .unwrap();

        assert_eq!(cache.get_text(ids::MANUFACTURER).unwrap(), "ASI");
        assert_eq!(cache.get_text(ids::MODEL).unwrap(), "TPX3");
        assert_eq!(cache.get_text(ids::SERIAL_NUMBER).unwrap(), "W0042");
        assert_eq!(cache.get_text(ids::FIRMWARE_VERSION).unwrap(), "2.3.1");
        assert_eq!(cache.get_int(ids::SIZE_X).unwrap(), 448);
        assert_eq!(cache.get_int(ids::SIZE_Y).unwrap(), 512);
    }

    #[tokio::test]
    async fn refresh_when_disconnected_is_noop_success() {
        let mock = MockEndpoint::new().with_response("/", 500, "");
        let mut cache = identity_cache();
        let conn = connected(&mock, &mut cache).await;
        assert!(!conn.is_connected());

        refresh_dashboard(&conn, &mock, &CommandVocabulary::default(), &mut cache)
            .await
            .unwrap();

        // Only the probe hit the endpoint; no dashboard query was issued.
        assert_eq!(mock.request_count("/dashboard"), 0);
        assert_eq!(cache.get_text(ids::MODEL).unwrap(), "");
    }

    #[tokio::test]
    async fn refresh_transport_failure_is_reported() {
        let mock = MockEndpoint::new()
            .with_response("/", 200, "")
            .with_unreachable("/dashboard");
        let mut cache = identity_cache();
        let conn = connected(&mock, &mut cache).await;

        let err = refresh_dashboard(&conn, &mock, &CommandVocabulary::default(), &mut cache)
            .await
            .unwrap_err();
        assert!(matches!(err, det_core::DetError::ConnectionFailure { .. }));
    }

    #[tokio::test]
    async fn refresh_ignores_unknown_and_absent_fields() {
        let mock = MockEndpoint::new()
            .with_response("/", 200, "")
            .with_response("/dashboard", 200, r#"{"model":"TPX3","uptime_s":1234}"#);
        let mut cache = identity_cache();
        cache.set_text(ids::MANUFACTURER, "preset").unwrap();
        let conn = connected(&mock, &mut cache).await;

        refresh_dashboard(&conn, &mock, &CommandVocabulary::default(), &mut cache)
            .await
            .unwrap();

        assert_eq!(cache.get_text(ids::MODEL).unwrap(), "TPX3");
        // Absent field leaves the previous value in place.
        assert_eq!(cache.get_text(ids::MANUFACTURER).unwrap(), "preset");
    }
}
