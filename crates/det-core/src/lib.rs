//! `det-core`
//!
//! Core types and traits for the networked pixel-detector driver.
//!
//! This crate holds everything the driver crates share:
//!
//! - [`params::ParameterCache`] — the typed, integer-id'd parameter store
//!   with publish-on-write snapshot broadcast
//! - [`state::AcquisitionState`] — the two-state acquisition lifecycle
//! - [`error::DetError`] — the structured error taxonomy
//! - [`handler`] — collaborator traits (generic parameter fallback,
//!   diagnostic sink)
//!
//! The concurrency contract is single-writer/multi-reader: one serialized
//! execution context mutates the cache, observers read immutable snapshots
//! from a watch channel. Drivers enforce the single writer with `&mut self`
//! on every dispatch path.

pub mod error;
pub mod handler;
pub mod params;
pub mod state;

pub use error::{DetError, DetResult};
pub use params::{ids, ParamId, ParamSnapshot, ParamValue, ParameterCache, FIRST_DRIVER_PARAM};
pub use state::AcquisitionState;
