//! Web surface for BlockPreview.
//!
//! An HTTP/WebSocket server that composes the preview pipeline, the sandbox
//! host and the asset proxy:
//!
//! - **[`api`]** -- REST handlers: render, frame document, content push,
//!   session close, asset proxy and status.
//! - **[`ws`]** -- the protocol socket.  The peer plays the isolated
//!   rendering context of one sandbox session.
//! - **[`server`]** -- [`WebServer`], router assembly and startup.
//! - **[`state`]** -- [`AppState`], shared by every handler.
//! - **[`error`]** -- [`ApiError`], which never leaks internal detail into a
//!   response body.

pub mod api;
pub mod error;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    ///
    /// Default: **127.0.0.1**.
    pub bind_addr: String,
    /// The port to listen on.
    ///
    /// Default: **3000**.
    pub port: u16,
    /// Origin the browser reaches this server at, used for the frame's
    /// asset CSP.  When unset it is derived from the request's `Host`.
    ///
    /// Default: **None**.
    pub public_origin: Option<String>,
    /// Seconds between sweeps that drop closed sessions; `0` disables them.
    ///
    /// Default: **60**.
    pub prune_interval_secs: u64,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 3000,
            public_origin: None,
            prune_interval_secs: 60,
        }
    }
}

impl WebConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, bind_addr: impl Into<String>) -> Self {
        self.bind_addr = bind_addr.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_public_origin(mut self, origin: impl Into<String>) -> Self {
        self.public_origin = Some(origin.into());
        self
    }

    pub fn with_prune_interval_secs(mut self, secs: u64) -> Self {
        self.prune_interval_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WebConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.public_origin, None);
        assert_eq!(config.prune_interval_secs, 60);
    }

    #[test]
    fn builders() {
        let config = WebConfig::new()
            .with_bind_addr("0.0.0.0")
            .with_port(8080)
            .with_public_origin("https://preview.example.org")
            .with_prune_interval_secs(0);
        assert_eq!(config.bind_addr, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.public_origin.as_deref(),
            Some("https://preview.example.org")
        );
        assert_eq!(config.prune_interval_secs, 0);
    }
}
