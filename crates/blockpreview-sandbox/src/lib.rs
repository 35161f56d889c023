//! BlockPreview sandbox host.
//!
//! Delivers sanitized markup into an isolated rendering context that has no
//! ambient authority.
//!
//! - **[`session`]** -- [`SandboxSession`], the pure protocol state machine
//!   (`Uninitialized -> Handshaking -> Ready -> Closed`).
//! - **[`host`]** -- [`SandboxHost`], a concurrent registry of sessions,
//!   each driven by its own actor task; [`SessionHandle`] and
//!   [`ContextEndpoint`] are the two ends of a session.
//! - **[`protocol`]** -- [`HostMessage`] and [`ContextMessage`].
//! - **[`frame`]** -- [`FramePolicy`], the frame's `sandbox` attribute and
//!   `srcdoc` document.
//! - **[`pipeline`]** -- [`PreviewPipeline`], blocks to [`RenderedPreview`].
//! - **[`config`]** -- [`SandboxConfig`].
//! - **[`error`]** -- [`SandboxError`].

pub mod config;
pub mod error;
pub mod frame;
pub mod host;
pub mod pipeline;
pub mod protocol;
pub mod session;

pub use config::SandboxConfig;
pub use error::{Result, SandboxError};
pub use frame::{ASSET_PROXY_PATH, FramePolicy};
pub use host::{
    ContextEndpoint, ContextSender, SandboxHost, SessionHandle, SessionId, SessionInfo,
    SessionStatus,
};
pub use pipeline::{PreviewPipeline, RenderedPreview};
pub use protocol::{ContextMessage, HostMessage};
pub use session::{CloseReason, SandboxSession, SessionState, UpdateReceipt};
