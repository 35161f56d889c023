//! Sandbox error types.
//!
//! All sandbox subsystems surface errors through [`SandboxError`].  Protocol
//! errors close the session; callers that want to retry open a new one.

use blockpreview_blocks::BlockError;

use crate::session::SessionState;

/// Unified error type for the sandbox host.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The session is closed; nothing more can be delivered to it.
    #[error("session closed")]
    SessionClosed,

    /// The context never answered the handshake.
    #[error("handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout {
        /// The configured deadline in milliseconds.
        timeout_ms: u64,
    },

    /// A message or event arrived in a state that does not accept it.
    #[error("unexpected `{message}` in state {state}")]
    UnexpectedMessage {
        message: &'static str,
        state: SessionState,
    },

    /// No live session has this id.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// The blocks could not be turned into markup.
    #[error("render failed: {0}")]
    Render(#[from] BlockError),
}

/// Convenience alias used throughout the sandbox crate.
pub type Result<T> = std::result::Result<T, SandboxError>;
