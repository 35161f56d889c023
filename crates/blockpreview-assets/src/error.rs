//! Asset proxy error types.
//!
//! [`AssetError::InvalidKey`] means the caller asked for something outside
//! the key grammar or outside the asset root; it is logged separately from
//! [`AssetError::NotFound`] because it signals probing.  None of the
//! variants' detail is meant for end users: use
//! [`AssetError::public_message`] for anything that leaves the process.

/// Unified error type for the asset proxy.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The key is malformed or resolves outside the asset root.
    #[error("invalid asset key: {reason}")]
    InvalidKey { reason: &'static str },

    /// No regular file exists under the key.
    #[error("asset not found: {key}")]
    NotFound { key: String },

    /// The asset store could not be read.
    #[error("asset store error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    /// HTTP status the web surface answers with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidKey { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Io(_) => 500,
        }
    }

    /// Generic text safe to show to an end user.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidKey { .. } => "invalid asset key",
            Self::NotFound { .. } => "asset not found",
            Self::Io(_) => "preview unavailable",
        }
    }
}

/// Convenience alias used throughout the assets crate.
pub type Result<T> = std::result::Result<T, AssetError>;
