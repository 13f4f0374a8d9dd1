//! Acquisition lifecycle state.

use serde::{Deserialize, Serialize};

/// The detector's acquisition lifecycle.
///
/// Starts at `Idle` and toggles only through the acquisition controller.
/// After every publish, the `DETECTOR_STATE` parameter must equal
/// `as_param()` of the current state; the controller exists to guarantee
/// exactly that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionState {
    /// Not collecting data; safe to reconfigure.
    Idle,
    /// Data collection session in progress.
    Acquiring,
}

impl AcquisitionState {
    /// Integer encoding used by the `DETECTOR_STATE` parameter.
    pub fn as_param(self) -> i64 {
        match self {
            AcquisitionState::Idle => 0,
            AcquisitionState::Acquiring => 1,
        }
    }
}
