//! Control-server reachability.
//!
//! The connection is probed exactly once, at driver construction: a single
//! GET of the server root, classified as connected iff the status code is
//! 200. The raw status code lands in the `HTTP_CODE` parameter either way.
//! There are no retries; later components discover a dead device only when
//! their own requests fail.

use crate::endpoint::EndpointClient;
use det_core::params::{ids, ParameterCache};
use det_core::DetResult;

/// Reachability state of the detector's control endpoint.
///
/// Created at driver construction, refreshed only by [`Self::probe`];
/// never mutated by acquisition logic.
pub struct DeviceConnection {
    server_url: String,
    last_status: Option<u16>,
    connected: bool,
}

impl DeviceConnection {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            last_status: None,
            connected: false,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Status code of the last probe, if one completed.
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Used by driver teardown to release the connection.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
    }

    /// One best-effort reachability check.
    ///
    /// Records the observed status code (0 when the server was unreachable
    /// at the transport level) into `HTTP_CODE` and publishes, then returns
    /// the derived connected flag.
    pub async fn probe(
        &mut self,
        client: &dyn EndpointClient,
        cache: &mut ParameterCache,
    ) -> DetResult<bool> {
        match client.get("/").await {
            Ok(response) => {
                tracing::debug!(status = response.status, "probe response");
                for (name, value) in &response.headers {
                    tracing::trace!(header = %name, value = %value, "probe header");
                }
                tracing::trace!(body = %response.body, "probe body");

                self.last_status = Some(response.status);
                self.connected = response.is_success();
                cache.set_int(ids::HTTP_CODE, i64::from(response.status))?;
                cache.publish();

                if !self.connected {
                    tracing::error!(
                        url = %self.server_url,
                        status = response.status,
                        "failed to connect to control server"
                    );
                }
                Ok(self.connected)
            }
            Err(error) => {
                self.last_status = None;
                self.connected = false;
                cache.set_int(ids::HTTP_CODE, 0)?;
                cache.publish();

                tracing::error!(
                    url = %self.server_url,
                    error = %error,
                    "control server unreachable"
                );
                Ok(false)
            }
        }
    }
}
