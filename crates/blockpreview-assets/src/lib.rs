//! BlockPreview asset proxy.
//!
//! The sandboxed preview has no filesystem or network authority of its own;
//! images and media it references are fetched through this proxy:
//!
//! - **[`key`]** -- [`AssetKey`], the lexical key grammar.
//! - **[`proxy`]** -- [`AssetProxy`], root confinement and reads, plus the
//!   response security headers.
//! - **[`mime`]** -- the fixed extension-to-MIME table.
//! - **[`error`]** -- [`AssetError`] with status codes and generic messages.

pub mod error;
pub mod key;
pub mod mime;
pub mod proxy;

pub use error::{AssetError, Result};
pub use key::{AssetKey, MAX_KEY_LEN};
pub use mime::{DEFAULT_CONTENT_TYPE, content_type_for};
pub use proxy::{
    Asset, AssetConfig, AssetInfo, AssetProxy, CONTENT_SECURITY_POLICY, X_CONTENT_TYPE_OPTIONS,
};
