//! Driver components.
//!
//! - [`connection`]: startup probe and reachability state
//! - [`status`]: identity/telemetry refresh from the dashboard query
//! - [`acquisition`]: the start/stop state machine

pub mod acquisition;
pub mod connection;
pub mod status;
