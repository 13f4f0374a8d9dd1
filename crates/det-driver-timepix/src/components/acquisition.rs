//! Acquisition state machine.
//!
//! Two states, Idle and Acquiring, with idempotent transitions: several
//! independent control inputs (the acquire flag, image-mode changes,
//! exposure changes) can each request the same transition, so a redundant
//! start or stop is a successful no-op rather than an error.
//!
//! The controller mutates the cache but never publishes; the dispatcher
//! owns the single publish-on-write path. After any completed transition
//! the `ACQUIRE` and `DETECTOR_STATE` parameters agree with the in-memory
//! state, so the next publish presents a consistent picture to observers.

use crate::components::connection::DeviceConnection;
use crate::endpoint::{CommandVocabulary, EndpointClient};
use det_core::params::{ids, ParameterCache};
use det_core::{AcquisitionState, DetError, DetResult};

pub struct AcquisitionController {
    state: AcquisitionState,
}

impl AcquisitionController {
    pub fn new() -> Self {
        Self {
            state: AcquisitionState::Idle,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Begin an acquisition session.
    ///
    /// No-op success when already acquiring. On command failure the state
    /// stays Idle and the caller must not advance it either.
    pub async fn start(
        &mut self,
        connection: &DeviceConnection,
        client: &dyn EndpointClient,
        vocab: &CommandVocabulary,
        cache: &mut ParameterCache,
    ) -> DetResult<()> {
        if self.state == AcquisitionState::Acquiring {
            tracing::debug!("start requested while already acquiring, ignoring");
            return Ok(());
        }

        if !connection.is_connected() {
            return Err(DetError::CommandFailure {
                operation: "begin acquisition",
                reason: "device not connected".to_string(),
            });
        }

        let response =
            client
                .get(&vocab.begin_acquisition)
                .await
                .map_err(|e| DetError::CommandFailure {
                    operation: "begin acquisition",
                    reason: e.to_string(),
                })?;

        if !response.is_success() {
            return Err(DetError::CommandFailure {
                operation: "begin acquisition",
                reason: format!("status {}", response.status),
            });
        }

        self.state = AcquisitionState::Acquiring;
        cache.set_int(ids::DETECTOR_STATE, self.state.as_param())?;
        cache.set_int(ids::ACQUIRE, 1)?;
        tracing::info!("acquisition started");
        Ok(())
    }

    /// End the acquisition session.
    ///
    /// No-op success when already idle; no device command is issued then.
    /// Otherwise the end command is best-effort: a camera left marked
    /// acquiring forever is worse than an unconfirmed stop, so the local
    /// state goes to Idle even when the command fails, and the failure is
    /// only logged.
    pub async fn stop(
        &mut self,
        client: &dyn EndpointClient,
        vocab: &CommandVocabulary,
        cache: &mut ParameterCache,
    ) -> DetResult<()> {
        if self.state == AcquisitionState::Idle {
            tracing::debug!("stop requested while already idle, ignoring");
            return Ok(());
        }

        match client.get(&vocab.end_acquisition).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => {
                tracing::warn!(
                    status = response.status,
                    "end acquisition rejected, forcing local idle state"
                );
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    "end acquisition unreachable, forcing local idle state"
                );
            }
        }

        self.state = AcquisitionState::Idle;
        cache.set_int(ids::DETECTOR_STATE, self.state.as_param())?;
        cache.set_int(ids::ACQUIRE, 0)?;
        tracing::info!("acquisition stopped");
        Ok(())
    }
}

impl Default for AcquisitionController {
    fn default() -> Self {
        Self::new()
    }
}
