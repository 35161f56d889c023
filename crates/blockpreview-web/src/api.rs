//! REST API route handlers.
//!
//! Provides endpoints for rendering a project, building the isolated frame
//! document, pushing content into a live session, closing sessions, serving
//! assets and reporting status.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, header};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use blockpreview_blocks::{ProjectId, RawBlock};
use blockpreview_codegen::LineMapping;
use blockpreview_sandbox::{RenderedPreview, SandboxError, SessionId, SessionInfo, UpdateReceipt};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the value for the frame's `sandbox` attribute.
pub const X_FRAME_SANDBOX: HeaderName = HeaderName::from_static("x-frame-sandbox");

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of every endpoint that renders blocks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
}

impl PreviewRequest {
    fn render(self, state: &AppState) -> Result<RenderedPreview, ApiError> {
        Ok(state.pipeline.render(self.project_id, self.blocks)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct AssetQuery {
    #[serde(rename = "assetPath")]
    pub asset_path: String,
}

// ---------------------------------------------------------------------------
// GET /api/status
// ---------------------------------------------------------------------------

/// Response payload for the `/api/status` endpoint.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub live_sessions: usize,
    pub uptime_seconds: u64,
}

/// Return basic server status.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        live_sessions: state.host.live_count(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

// ---------------------------------------------------------------------------
// POST /api/preview/render
// ---------------------------------------------------------------------------

/// Render a project to safe markup plus its line mapping.
pub async fn render(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PreviewRequest>,
) -> Result<Json<RenderedPreview>, ApiError> {
    Ok(Json(body.render(&state)?))
}

// ---------------------------------------------------------------------------
// POST /api/preview/frame
// ---------------------------------------------------------------------------

/// Render a project into the isolated frame's `srcdoc` document.
pub async fn frame(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PreviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let preview = body.render(&state)?;
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let policy = state.frame_policy(host);

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (X_FRAME_SANDBOX, policy.sandbox_attribute()),
        ],
        policy.document(&preview.markup),
    ))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Response payload for a content push.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentResponse {
    pub session_id: SessionId,
    pub receipt: UpdateReceipt,
    pub mapping: LineMapping,
}

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    Ok(raw.parse::<SessionId>()?)
}

/// List every registered session.
pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    Json(state.host.list())
}

/// Render blocks and push the result into a session.
pub async fn push_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PreviewRequest>,
) -> Result<Json<ContentResponse>, ApiError> {
    let session_id = parse_session_id(&id)?;
    let handle = state
        .host
        .get(&session_id)
        .ok_or_else(|| SandboxError::SessionNotFound { session_id: id })?;

    let preview = body.render(&state)?;
    let receipt = handle.update(preview.markup).await?;
    tracing::debug!(
        session_id = %session_id,
        revision = receipt.revision(),
        "content pushed"
    );

    Ok(Json(ContentResponse {
        session_id,
        receipt,
        mapping: preview.mapping,
    }))
}

/// Close a session and remove it from the registry.
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session_id = parse_session_id(&id)?;
    state.host.close(&session_id).await?;
    Ok(Json(json!({ "closed": true })))
}

// ---------------------------------------------------------------------------
// GET /api/preview/asset
// ---------------------------------------------------------------------------

/// Serve one asset from the asset root.
pub async fn asset(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AssetQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let asset = state.proxy.fetch(&query.asset_path).await?;
    let headers = asset.headers();
    Ok((headers, asset.bytes))
}
