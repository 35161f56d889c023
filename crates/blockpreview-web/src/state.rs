//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request handlers
//! and WebSocket connections.  The sandbox host and asset proxy are
//! themselves cheap to clone; the pipeline is immutable once built.

use std::time::Instant;

use blockpreview_assets::{AssetConfig, AssetProxy};
use blockpreview_sandbox::{FramePolicy, PreviewPipeline, SandboxConfig, SandboxHost};
use blockpreview_sanitize::SanitizePolicy;

use crate::WebConfig;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Web server configuration.
    pub config: WebConfig,

    /// Registry of live preview sessions.
    pub host: SandboxHost,

    /// Blocks -> generated markup -> sanitized markup.
    pub pipeline: PreviewPipeline,

    /// Read-only view of the asset root.
    pub proxy: AssetProxy,

    /// When the state was built, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: WebConfig,
        sandbox: SandboxConfig,
        policy: SanitizePolicy,
        assets: AssetConfig,
    ) -> Self {
        Self {
            config,
            host: SandboxHost::new(sandbox),
            pipeline: PreviewPipeline::new(policy),
            proxy: AssetProxy::new(assets),
            started_at: Instant::now(),
        }
    }

    /// Frame policy for a request.  `host_header` is the request's `Host`,
    /// used when no public origin is configured.
    pub fn frame_policy(&self, host_header: Option<&str>) -> FramePolicy {
        let policy = FramePolicy::new(self.host.config());
        match (&self.config.public_origin, host_header) {
            (Some(origin), _) => policy.with_asset_origin(origin),
            (None, Some(host)) => policy.with_asset_origin(&format!("http://{host}")),
            (None, None) => policy,
        }
    }
}
