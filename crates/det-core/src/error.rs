//! Error types for the detector driver.
//!
//! `DetError` is the structured error type shared by the core and the driver
//! crates. The variants fall into two groups:
//!
//! - **Device errors** — `ConnectionFailure` and `CommandFailure`. Both are
//!   non-fatal: a failed probe or refresh leaves the acquisition state
//!   untouched, and a failed start aborts without advancing state. A failed
//!   stop still forces the local state to Idle (best-effort stop policy).
//! - **Cache errors** — `UnknownParameter` and `TypeMismatch` indicate a
//!   programming error in the calling code (wrong id, wrong value type) and
//!   are surfaced immediately.
//!
//! There is deliberately no "invalid transition" variant: the acquisition
//! state machine treats every transition request as either an action or a
//! harmless no-op, never as a structural error.

use crate::params::ParamId;
use thiserror::Error;

/// Convenience alias for results using the detector error type.
pub type DetResult<T> = std::result::Result<T, DetError>;

/// Primary error type for the detector driver.
#[derive(Error, Debug)]
pub enum DetError {
    /// The control endpoint could not be reached, or answered with a
    /// non-success status during a probe or telemetry refresh.
    #[error("connection failure for '{url}': {reason}")]
    ConnectionFailure { url: String, reason: String },

    /// A device command (begin/end acquisition) was rejected or unreachable.
    #[error("command '{operation}' failed: {reason}")]
    CommandFailure {
        operation: &'static str,
        reason: String,
    },

    /// A response payload could not be decoded.
    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    /// A parameter id the cache has never seen.
    #[error("unknown parameter id {id}")]
    UnknownParameter { id: ParamId },

    /// A write used a value type that does not match the parameter.
    #[error("type mismatch for parameter id {id}: expected {expected}")]
    TypeMismatch {
        id: ParamId,
        expected: &'static str,
    },

    /// The generic parameter handler rejected a delegated write.
    #[error("generic handler rejected parameter id {id}: {reason}")]
    Handler { id: ParamId, reason: String },

    /// Driver configuration is semantically invalid.
    #[error("configuration error: {0}")]
    Config(String),
}
