//! Collaborator traits at the driver's outer seams.
//!
//! The driver recognizes only its own parameter ids. Writes to ids below
//! [`crate::params::FIRST_DRIVER_PARAM`] belong to the surrounding runtime
//! and are delegated through [`GenericParamHandler`] — a capability trait
//! rather than base-class inheritance, so composition roots without a
//! framework can plug in [`NullHandler`].
//!
//! [`DiagnosticSink`] is the append-only text sink the diagnostic reporter
//! writes to.

use crate::params::ParamId;
use anyhow::Result;
use async_trait::async_trait;

/// Fallback handler for parameter writes the driver does not recognize.
#[async_trait]
pub trait GenericParamHandler: Send + Sync {
    async fn write_int(&mut self, id: ParamId, value: i64) -> Result<()>;

    async fn write_float(&mut self, id: ParamId, value: f64) -> Result<()>;

    async fn write_text(&mut self, id: ParamId, value: &str) -> Result<()>;
}

/// Accepts every delegated write and logs it at debug level.
pub struct NullHandler;

#[async_trait]
impl GenericParamHandler for NullHandler {
    async fn write_int(&mut self, id: ParamId, value: i64) -> Result<()> {
        tracing::debug!(id, value, "delegated integer write (no handler)");
        Ok(())
    }

    async fn write_float(&mut self, id: ParamId, value: f64) -> Result<()> {
        tracing::debug!(id, value, "delegated float write (no handler)");
        Ok(())
    }

    async fn write_text(&mut self, id: ParamId, value: &str) -> Result<()> {
        tracing::debug!(id, value, "delegated text write (no handler)");
        Ok(())
    }
}

/// Append-only sink for diagnostic report output.
pub trait DiagnosticSink {
    fn write(&mut self, text: &str);
}

/// Collect report output into an owned buffer (handy in tests).
impl DiagnosticSink for String {
    fn write(&mut self, text: &str) {
        self.push_str(text);
    }
}

/// Emit report lines through the tracing subscriber.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn write(&mut self, text: &str) {
        for line in text.lines() {
            tracing::info!(target: "report", "{}", line);
        }
    }
}
