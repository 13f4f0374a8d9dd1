//! Typed parameter cache with publish-on-write semantics.
//!
//! Parameters are identified by a stable integer id and hold the last
//! written (or last refreshed-from-device) value. The cache is owned by
//! exactly one driver instance and mutated only on its serialized dispatch
//! path; observers receive immutable snapshots through a
//! [`tokio::sync::watch`] channel.
//!
//! The contract the rest of the system leans on: immediately after
//! [`ParameterCache::publish`], the snapshot held by every subscriber equals
//! the in-cache values. Between a write and the next publish the two may
//! transiently diverge, which is why every mutation path in the driver ends
//! in a publish before control returns to the caller.
//!
//! # Example
//!
//! ```rust
//! use det_core::params::{ids, ParameterCache, ParamValue};
//!
//! let mut cache = ParameterCache::new();
//! cache.create(ids::SIZE_X, ParamValue::Int(0));
//! cache.set_int(ids::SIZE_X, 512).unwrap();
//!
//! let rx = cache.subscribe();
//! cache.publish();
//! assert_eq!(rx.borrow().get(&ids::SIZE_X), Some(&ParamValue::Int(512)));
//! ```

use crate::error::{DetError, DetResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::watch;

/// Stable integer identifier of a parameter.
pub type ParamId = u32;

/// Ids at or above this value belong to the detector driver itself.
/// Writes to ids below it carry no acquisition semantics and are delegated
/// to the surrounding runtime's generic parameter handler.
pub const FIRST_DRIVER_PARAM: ParamId = 100;

/// Well-known parameter ids.
pub mod ids {
    use super::ParamId;

    /// Start/stop acquisition control (0 = stop, nonzero = start).
    pub const ACQUIRE: ParamId = 100;
    /// Image readout mode selector.
    pub const IMAGE_MODE: ParamId = 101;
    /// Exposure time in seconds.
    pub const ACQUIRE_TIME: ParamId = 102;
    /// Read-only acquisition status (0 = idle, 1 = acquiring).
    pub const DETECTOR_STATE: ParamId = 103;
    /// Raw HTTP status code from the last connection probe.
    pub const HTTP_CODE: ParamId = 104;
    /// Sensor width in pixels.
    pub const SIZE_X: ParamId = 105;
    /// Sensor height in pixels.
    pub const SIZE_Y: ParamId = 106;
    /// Detector vendor name.
    pub const MANUFACTURER: ParamId = 107;
    /// Detector model name.
    pub const MODEL: ParamId = 108;
    /// Detector serial number.
    pub const SERIAL_NUMBER: ParamId = 109;
    /// Detector firmware version.
    pub const FIRMWARE_VERSION: ParamId = 110;
    /// Control endpoint address the driver was constructed with.
    pub const SERVER_URL: ParamId = 111;
    /// Version of this driver.
    pub const DRIVER_VERSION: ParamId = 112;
}

// =============================================================================
// ParamValue
// =============================================================================

/// A parameter value with one of the three semantic types the control
/// system distinguishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Immutable copy of the cache, as delivered to observers.
pub type ParamSnapshot = HashMap<ParamId, ParamValue>;

// =============================================================================
// ParameterCache
// =============================================================================

/// Owned key-value store for parameters, with snapshot broadcast.
///
/// Single-writer by construction: all mutating methods take `&mut self`,
/// and the driver that owns the cache is itself externally serialized.
pub struct ParameterCache {
    values: HashMap<ParamId, ParamValue>,
    tx: watch::Sender<ParamSnapshot>,
}

impl ParameterCache {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ParamSnapshot::new());
        Self {
            values: HashMap::new(),
            tx,
        }
    }

    /// Register a parameter with its initial value. The initial value fixes
    /// the parameter's semantic type for all later writes.
    pub fn create(&mut self, id: ParamId, initial: ParamValue) {
        self.values.insert(id, initial);
    }

    /// Whether the cache has a parameter with this id.
    pub fn contains(&self, id: ParamId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn set_int(&mut self, id: ParamId, value: i64) -> DetResult<()> {
        match self.values.get_mut(&id) {
            Some(ParamValue::Int(slot)) => {
                *slot = value;
                Ok(())
            }
            Some(other) => Err(DetError::TypeMismatch {
                id,
                expected: other.type_name(),
            }),
            None => Err(DetError::UnknownParameter { id }),
        }
    }

    pub fn set_float(&mut self, id: ParamId, value: f64) -> DetResult<()> {
        match self.values.get_mut(&id) {
            Some(ParamValue::Float(slot)) => {
                *slot = value;
                Ok(())
            }
            Some(other) => Err(DetError::TypeMismatch {
                id,
                expected: other.type_name(),
            }),
            None => Err(DetError::UnknownParameter { id }),
        }
    }

    pub fn set_text(&mut self, id: ParamId, value: impl Into<String>) -> DetResult<()> {
        match self.values.get_mut(&id) {
            Some(ParamValue::Text(slot)) => {
                *slot = value.into();
                Ok(())
            }
            Some(other) => Err(DetError::TypeMismatch {
                id,
                expected: other.type_name(),
            }),
            None => Err(DetError::UnknownParameter { id }),
        }
    }

    pub fn get_int(&self, id: ParamId) -> DetResult<i64> {
        match self.values.get(&id) {
            Some(ParamValue::Int(v)) => Ok(*v),
            Some(other) => Err(DetError::TypeMismatch {
                id,
                expected: other.type_name(),
            }),
            None => Err(DetError::UnknownParameter { id }),
        }
    }

    pub fn get_float(&self, id: ParamId) -> DetResult<f64> {
        match self.values.get(&id) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(other) => Err(DetError::TypeMismatch {
                id,
                expected: other.type_name(),
            }),
            None => Err(DetError::UnknownParameter { id }),
        }
    }

    pub fn get_text(&self, id: ParamId) -> DetResult<&str> {
        match self.values.get(&id) {
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(DetError::TypeMismatch {
                id,
                expected: other.type_name(),
            }),
            None => Err(DetError::UnknownParameter { id }),
        }
    }

    /// Push the current cache state to all subscribers.
    ///
    /// Always succeeds; a publish with no subscribers is not an error.
    pub fn publish(&mut self) {
        self.tx.send_replace(self.values.clone());
    }

    /// Subscribe to published snapshots. The receiver initially holds the
    /// snapshot from the most recent publish.
    pub fn subscribe(&self) -> watch::Receiver<ParamSnapshot> {
        self.tx.subscribe()
    }

    /// Direct read of the live (possibly not yet published) values.
    pub fn values(&self) -> &HashMap<ParamId, ParamValue> {
        &self.values
    }
}

impl Default for ParameterCache {
    fn default() -> Self {
        Self::new()
    }
}
