//! Timepix-style networked pixel-detector driver.
//!
//! Exposes the detector as a set of typed parameters and translates
//! parameter writes into control-API commands:
//!
//! - **Connection probe**: one reachability check at construction
//!   ([`components::connection`])
//! - **Status refresh**: identity/telemetry into parameters
//!   ([`components::status`])
//! - **Acquisition controller**: the idle/acquiring state machine
//!   ([`components::acquisition`])
//! - **Parameter dispatcher**: [`TimepixDriver::write_int`] /
//!   [`write_float`](TimepixDriver::write_float) /
//!   [`write_text`](TimepixDriver::write_text)
//!
//! # Dispatch contract
//!
//! Every write stores the value in the cache first (the cache always
//! reflects the most recent intent, even when the action then fails),
//! routes acquisition-relevant ids through the controller, delegates ids
//! below [`det_core::FIRST_DRIVER_PARAM`] to the generic handler, and ends
//! in an unconditional publish before the outcome is returned. Observers
//! therefore never see a stale view, and a failed action is visible both
//! as the returned error and through the published status parameters.
//!
//! # Concurrency
//!
//! All dispatch methods take `&mut self`: the surrounding runtime (or
//! test) serializes operations per driver instance, and endpoint round
//! trips are awaited inline on the dispatch path. A slow device stalls
//! later writes until the bounded request timeout expires.

pub mod components;
pub mod endpoint;
pub mod mock;
mod report;

use crate::components::acquisition::AcquisitionController;
use crate::components::connection::DeviceConnection;
use crate::components::status::refresh_dashboard;
use crate::endpoint::{CommandVocabulary, EndpointClient};
use anyhow::Result;
use det_core::handler::{DiagnosticSink, GenericParamHandler, NullHandler};
use det_core::params::{ids, ParamId, ParamSnapshot, ParamValue, ParameterCache};
use det_core::{AcquisitionState, DetError, DetResult, FIRST_DRIVER_PARAM};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Version string published through the `DRIVER_VERSION` parameter.
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn default_buffer_limit() -> usize {
    256
}
fn default_memory_limit() -> usize {
    512 * 1024 * 1024
}
fn default_stack_size() -> usize {
    128 * 1024
}

/// Construction parameters for one driver instance.
///
/// `buffer_limit`, `memory_limit`, `priority` and `stack_size` are hints
/// for the hosting runtime (frame buffering and worker sizing happen
/// outside this driver); they are recorded and logged but not enforced
/// here.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// Instance name, used in logs and reports.
    pub name: String,
    /// Address of the detector's control endpoint.
    pub server_url: String,
    #[serde(default = "default_buffer_limit")]
    pub buffer_limit: usize,
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
}

impl DriverConfig {
    pub fn new(name: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server_url: server_url.into(),
            buffer_limit: default_buffer_limit(),
            memory_limit: default_memory_limit(),
            priority: 0,
            stack_size: default_stack_size(),
        }
    }

    /// Check the parts of the configuration the driver cannot run without.
    /// An empty server URL is allowed (the probe is skipped); an unnamed
    /// instance is not.
    pub fn validate(&self) -> DetResult<()> {
        if self.name.is_empty() {
            return Err(DetError::Config(
                "instance name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Driver for a Timepix-style pixel detector controlled over HTTP.
pub struct TimepixDriver {
    config: DriverConfig,
    cache: ParameterCache,
    connection: DeviceConnection,
    controller: AcquisitionController,
    client: Arc<dyn EndpointClient>,
    vocab: CommandVocabulary,
    generic: Box<dyn GenericParamHandler>,
}

impl TimepixDriver {
    /// Construct a driver and perform the startup handshake: seed the
    /// parameter set, probe the control endpoint once, and (only when the
    /// probe succeeded) pull the identity telemetry.
    ///
    /// A failed probe is not fatal: the driver is returned with the
    /// connection marked down and the raw status visible in `HTTP_CODE`.
    pub async fn new_async(config: DriverConfig, client: Arc<dyn EndpointClient>) -> Result<Self> {
        Self::with_vocabulary(config, client, CommandVocabulary::default()).await
    }

    /// As [`Self::new_async`], with device-specific command sub-paths.
    pub async fn with_vocabulary(
        config: DriverConfig,
        client: Arc<dyn EndpointClient>,
        vocab: CommandVocabulary,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            name = %config.name,
            url = %config.server_url,
            buffers = config.buffer_limit,
            memory = config.memory_limit,
            priority = config.priority,
            stack_size = config.stack_size,
            "constructing detector driver"
        );

        let mut cache = Self::seed_parameters(&config);
        let mut connection = DeviceConnection::new(&config.server_url);
        let controller = AcquisitionController::new();

        if config.server_url.is_empty() {
            tracing::error!("no control server address configured, skipping connection probe");
        } else {
            let connected = connection.probe(&*client, &mut cache).await?;
            if connected {
                tracing::debug!("acquiring device information");
                if let Err(error) =
                    refresh_dashboard(&connection, &*client, &vocab, &mut cache).await
                {
                    tracing::warn!(error = %error, "initial telemetry refresh failed");
                }
                Self::log_device_info(&cache);
            }
        }

        cache.publish();

        Ok(Self {
            config,
            cache,
            connection,
            controller,
            client,
            vocab,
            generic: Box::new(NullHandler),
        })
    }

    /// Replace the fallback handler for parameter ids outside the driver's
    /// range (by default every delegated write is accepted and dropped).
    pub fn with_generic_handler(mut self, handler: Box<dyn GenericParamHandler>) -> Self {
        self.generic = handler;
        self
    }

    fn seed_parameters(config: &DriverConfig) -> ParameterCache {
        let mut cache = ParameterCache::new();
        cache.create(ids::ACQUIRE, ParamValue::Int(0));
        cache.create(ids::IMAGE_MODE, ParamValue::Int(0));
        cache.create(ids::ACQUIRE_TIME, ParamValue::Float(1.0));
        cache.create(ids::DETECTOR_STATE, ParamValue::Int(0));
        cache.create(ids::HTTP_CODE, ParamValue::Int(0));
        cache.create(ids::SIZE_X, ParamValue::Int(0));
        cache.create(ids::SIZE_Y, ParamValue::Int(0));
        cache.create(ids::MANUFACTURER, ParamValue::Text(String::new()));
        cache.create(ids::MODEL, ParamValue::Text(String::new()));
        cache.create(ids::SERIAL_NUMBER, ParamValue::Text(String::new()));
        cache.create(ids::FIRMWARE_VERSION, ParamValue::Text(String::new()));
        cache.create(ids::SERVER_URL, ParamValue::Text(config.server_url.clone()));
        cache.create(
            ids::DRIVER_VERSION,
            ParamValue::Text(DRIVER_VERSION.to_string()),
        );
        cache
    }

    fn log_device_info(cache: &ParameterCache) {
        tracing::info!(
            manufacturer = cache.get_text(ids::MANUFACTURER).unwrap_or(""),
            model = cache.get_text(ids::MODEL).unwrap_or(""),
            serial = cache.get_text(ids::SERIAL_NUMBER).unwrap_or(""),
            firmware = cache.get_text(ids::FIRMWARE_VERSION).unwrap_or(""),
            "connected to detector"
        );
    }

    // =========================================================================
    // Parameter dispatch
    // =========================================================================

    /// Dispatch an integer parameter write.
    pub async fn write_int(&mut self, id: ParamId, value: i64) -> DetResult<()> {
        tracing::debug!(id, value, "integer parameter write");

        let stored = match self.cache.set_int(id, value) {
            // Ids below the driver range are owned elsewhere; delegation
            // below decides their fate.
            Err(DetError::UnknownParameter { .. }) if id < FIRST_DRIVER_PARAM => Ok(()),
            other => other,
        };

        let action: DetResult<()> = if stored.is_ok() {
            match id {
                ids::ACQUIRE => {
                    if value != 0 && self.controller.state() == AcquisitionState::Idle {
                        self.controller
                            .start(&self.connection, &*self.client, &self.vocab, &mut self.cache)
                            .await
                    } else if value == 0 && self.controller.state() == AcquisitionState::Acquiring {
                        self.controller
                            .stop(&*self.client, &self.vocab, &mut self.cache)
                            .await
                    } else {
                        Ok(())
                    }
                }
                // Mode changes are not permitted while acquiring: stop first,
                // the new mode applies to the next session.
                ids::IMAGE_MODE => {
                    if self.controller.state() == AcquisitionState::Acquiring {
                        self.controller
                            .stop(&*self.client, &self.vocab, &mut self.cache)
                            .await
                    } else {
                        Ok(())
                    }
                }
                _ if id < FIRST_DRIVER_PARAM => self
                    .generic
                    .write_int(id, value)
                    .await
                    .map_err(|e| DetError::Handler {
                        id,
                        reason: e.to_string(),
                    }),
                _ => Ok(()),
            }
        } else {
            Ok(())
        };

        self.finish_write(id, stored.and(action))
    }

    /// Dispatch a floating-point parameter write.
    pub async fn write_float(&mut self, id: ParamId, value: f64) -> DetResult<()> {
        tracing::debug!(id, value, "float parameter write");

        let stored = match self.cache.set_float(id, value) {
            Err(DetError::UnknownParameter { .. }) if id < FIRST_DRIVER_PARAM => Ok(()),
            other => other,
        };

        let action: DetResult<()> = if stored.is_ok() {
            match id {
                // An exposure change cannot be applied to a running
                // acquisition; any write here halts it.
                ids::ACQUIRE_TIME => {
                    if self.controller.state() == AcquisitionState::Acquiring {
                        self.controller
                            .stop(&*self.client, &self.vocab, &mut self.cache)
                            .await
                    } else {
                        Ok(())
                    }
                }
                _ if id < FIRST_DRIVER_PARAM => self
                    .generic
                    .write_float(id, value)
                    .await
                    .map_err(|e| DetError::Handler {
                        id,
                        reason: e.to_string(),
                    }),
                _ => Ok(()),
            }
        } else {
            Ok(())
        };

        self.finish_write(id, stored.and(action))
    }

    /// Dispatch a string parameter write. No string parameter carries
    /// acquisition semantics; driver-range ids are stored, the rest are
    /// delegated.
    pub async fn write_text(&mut self, id: ParamId, value: &str) -> DetResult<()> {
        tracing::debug!(id, value, "text parameter write");

        let stored = match self.cache.set_text(id, value) {
            Err(DetError::UnknownParameter { .. }) if id < FIRST_DRIVER_PARAM => Ok(()),
            other => other,
        };

        let action: DetResult<()> = if stored.is_ok() && id < FIRST_DRIVER_PARAM {
            self.generic
                .write_text(id, value)
                .await
                .map_err(|e| DetError::Handler {
                    id,
                    reason: e.to_string(),
                })
        } else {
            Ok(())
        };

        self.finish_write(id, stored.and(action))
    }

    /// Publish unconditionally, then surface the write outcome.
    fn finish_write(&mut self, id: ParamId, result: DetResult<()>) -> DetResult<()> {
        self.cache.publish();
        if let Err(error) = &result {
            tracing::error!(id, error = %error, "parameter write failed");
        }
        result
    }

    // =========================================================================
    // Telemetry, reporting, teardown
    // =========================================================================

    /// On-demand identity/telemetry refresh (no-op success when the device
    /// is not connected).
    pub async fn refresh(&mut self) -> DetResult<()> {
        refresh_dashboard(&self.connection, &*self.client, &self.vocab, &mut self.cache).await
    }

    /// Render a diagnostic report into the sink. Read-only.
    pub fn report(&self, sink: &mut dyn DiagnosticSink, details: i32) {
        report::write_report(&self.cache, &self.config.name, sink, details);
    }

    /// Stop any running acquisition (best-effort) and release the
    /// connection.
    pub async fn shutdown(&mut self) -> DetResult<()> {
        if self.controller.state() == AcquisitionState::Acquiring {
            self.controller
                .stop(&*self.client, &self.vocab, &mut self.cache)
                .await?;
        }
        self.connection.mark_disconnected();
        self.cache.publish();
        tracing::info!(name = %self.config.name, "detector driver shut down");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn acquisition_state(&self) -> AcquisitionState {
        self.controller.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Raw status code recorded by the startup probe, if it completed.
    pub fn last_status_code(&self) -> Option<u16> {
        self.connection.last_status()
    }

    /// Subscribe to published parameter snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ParamSnapshot> {
        self.cache.subscribe()
    }

    /// Live cache view (reads see values that may not be published yet).
    pub fn cache(&self) -> &ParameterCache {
        &self.cache
    }
}

impl Drop for TimepixDriver {
    fn drop(&mut self) {
        tracing::debug!(name = %self.config.name, "detector driver exiting");
        self.connection.mark_disconnected();
    }
}
