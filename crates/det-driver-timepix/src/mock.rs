//! Scripted in-memory endpoint for tests and offline bring-up.

use crate::endpoint::{EndpointClient, EndpointResponse};
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Scripted control endpoint.
///
/// Paths answer with a configured status/body, unconfigured paths answer
/// with the default status and an empty body, and individual paths can be
/// made unreachable to simulate transport failures. Every request is
/// recorded for assertions on command traffic.
pub struct MockEndpoint {
    responses: Mutex<HashMap<String, (u16, String)>>,
    unreachable: Mutex<Vec<String>>,
    default_status: u16,
    log: Mutex<Vec<String>>,
}

impl MockEndpoint {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(Vec::new()),
            default_status: 200,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Status answered for paths with no scripted response.
    pub fn with_default_status(mut self, status: u16) -> Self {
        self.default_status = status;
        self
    }

    /// Script a response for one path.
    pub fn with_response(self, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .insert(path.to_string(), (status, body.to_string()));
        self
    }

    /// Make one path fail at the transport level instead of answering.
    pub fn with_unreachable(self, path: &str) -> Self {
        self.unreachable.lock().push(path.to_string());
        self
    }

    /// Rescript a path after construction (usable through a shared handle).
    pub fn set_response(&self, path: &str, status: u16, body: &str) {
        self.responses
            .lock()
            .insert(path.to_string(), (status, body.to_string()));
    }

    /// Paths requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Number of requests issued against one path.
    pub fn request_count(&self, path: &str) -> usize {
        self.log.lock().iter().filter(|p| p.as_str() == path).count()
    }
}

impl Default for MockEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EndpointClient for MockEndpoint {
    async fn get(&self, path: &str) -> Result<EndpointResponse> {
        self.log.lock().push(path.to_string());

        if self.unreachable.lock().iter().any(|p| p == path) {
            bail!("connection refused: {}", path);
        }

        let (status, body) = self
            .responses
            .lock()
            .get(path)
            .cloned()
            .unwrap_or((self.default_status, String::new()));

        Ok(EndpointResponse {
            status,
            headers: HashMap::new(),
            body,
        })
    }
}
