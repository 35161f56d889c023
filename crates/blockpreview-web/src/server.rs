//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and starts
//! the HTTP listener.  It also spawns a background sweep that drops closed
//! sessions from the sandbox host's registry.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use blockpreview_assets::AssetConfig;
use blockpreview_sandbox::{ASSET_PROXY_PATH, SandboxConfig, SandboxHost};
use blockpreview_sanitize::SanitizePolicy;

use crate::WebConfig;
use crate::api;
use crate::state::AppState;
use crate::ws;

/// The BlockPreview web server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server.
    ///
    /// # Arguments
    ///
    /// * `config` - Bind address, port and sweep configuration.
    /// * `sandbox` - Handshake timeout and frame permissions for sessions.
    /// * `policy` - Sanitize policy applied to every rendered preview.
    /// * `assets` - Where the asset proxy reads from.
    pub fn new(
        config: WebConfig,
        sandbox: SandboxConfig,
        policy: SanitizePolicy,
        assets: AssetConfig,
    ) -> Self {
        let state = Arc::new(AppState::new(config.clone(), sandbox, policy, assets));
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(HeaderValue::from_static("*"))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(tower_http::cors::Any);

        Router::new()
            // REST API.
            .route("/api/status", get(api::status))
            .route(ASSET_PROXY_PATH, get(api::asset))
            .route("/api/preview/render", post(api::render))
            .route("/api/preview/frame", post(api::frame))
            // Session management.
            .route("/api/preview/sessions", get(api::list_sessions))
            .route("/api/preview/sessions/{id}", delete(api::close_session))
            .route("/api/preview/sessions/{id}/content", post(api::push_content))
            // Protocol socket.
            .route("/api/preview/session", get(ws::session_socket))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, "starting web server");
        self.serve(listener).await?;
        Ok(())
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let router = self.router();

        if self.config.prune_interval_secs > 0 {
            let period = Duration::from_secs(self.config.prune_interval_secs);
            tokio::spawn(prune_closed_sessions(self.state.host.clone(), period));
        }

        axum::serve(listener, router).await
    }
}

// ── background sweep ────────────────────────────────────────────────

async fn prune_closed_sessions(host: SandboxHost, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let pruned = host.prune_closed();
        if pruned > 0 {
            tracing::info!(pruned, live = host.live_count(), "swept closed sessions");
        }
    }
}
