//! Asset proxy.
//!
//! Resolves validated keys against a fixed root using `tokio::fs`.  The root
//! and the candidate are both canonicalized, so a key that reaches outside
//! the root through a symlink is rejected the same way as a `..` key.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::error::{AssetError, Result};
use crate::key::AssetKey;
use crate::mime::content_type_for;

/// Sent with every asset response.  `sandbox` keeps a directly opened asset
/// (an SVG, say) from running script in the host origin.
pub const CONTENT_SECURITY_POLICY: &str = "default-src 'none'; style-src 'unsafe-inline'; sandbox";

pub const X_CONTENT_TYPE_OPTIONS: &str = "nosniff";

/// Asset proxy configuration.
#[derive(Debug, Clone)]
pub struct AssetConfig {
    /// Directory every key is resolved against.
    pub root: PathBuf,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
        }
    }
}

impl AssetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}

/// A resolved asset and the metadata needed to serve it.
#[derive(Debug, Clone)]
pub struct Asset {
    pub key: AssetKey,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Asset {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Response headers every asset is served with.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            ("content-type", self.content_type.to_owned()),
            ("content-length", self.bytes.len().to_string()),
            ("content-security-policy", CONTENT_SECURITY_POLICY.to_owned()),
            ("x-content-type-options", X_CONTENT_TYPE_OPTIONS.to_owned()),
        ]
    }
}

/// Metadata for an asset without its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub key: AssetKey,
    pub content_type: &'static str,
    pub size: u64,
}

/// Serves bytes from under a single root directory.
#[derive(Debug, Clone)]
pub struct AssetProxy {
    root: PathBuf,
}

impl AssetProxy {
    pub fn new(config: AssetConfig) -> Self {
        Self { root: config.root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse `raw_key`, resolve it and read the asset.
    pub async fn fetch(&self, raw_key: &str) -> Result<Asset> {
        let key = self.parse_key(raw_key)?;
        let path = self.resolve(&key).await?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| self.classify_io(&key, e))?;

        debug!(key = %key, size = bytes.len(), "asset served");
        Ok(Asset {
            content_type: content_type_for(&key),
            key,
            bytes,
        })
    }

    /// Like [`fetch`](Self::fetch) but only reads metadata.
    pub async fn stat(&self, raw_key: &str) -> Result<AssetInfo> {
        let key = self.parse_key(raw_key)?;
        let path = self.resolve(&key).await?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| self.classify_io(&key, e))?;
        Ok(AssetInfo {
            content_type: content_type_for(&key),
            key,
            size: meta.len(),
        })
    }

    /// Canonical path of the regular file behind `key`.
    pub async fn resolve(&self, key: &AssetKey) -> Result<PathBuf> {
        let root = tokio::fs::canonicalize(&self.root).await.map_err(|e| {
            error!(root = %self.root.display(), error = %e, "asset root unavailable");
            AssetError::Io(e)
        })?;

        let candidate = root.join(key.to_relative_path());
        let resolved = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|e| self.classify_io(key, e))?;

        if !resolved.starts_with(&root) {
            warn!(
                target: "blockpreview::security",
                key = %key,
                "asset key escapes the asset root"
            );
            return Err(AssetError::InvalidKey {
                reason: "escapes asset root",
            });
        }

        let meta = tokio::fs::metadata(&resolved)
            .await
            .map_err(|e| self.classify_io(key, e))?;
        if !meta.is_file() {
            debug!(key = %key, "asset key names a non-file");
            return Err(AssetError::NotFound {
                key: key.to_string(),
            });
        }

        Ok(resolved)
    }

    fn parse_key(&self, raw_key: &str) -> Result<AssetKey> {
        AssetKey::parse(raw_key).inspect_err(|e| {
            warn!(
                target: "blockpreview::security",
                key = %raw_key.escape_debug(),
                error = %e,
                "rejected asset key"
            );
        })
    }

    fn classify_io(&self, key: &AssetKey, e: std::io::Error) -> AssetError {
        if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) {
            debug!(key = %key, "asset not found");
            AssetError::NotFound {
                key: key.to_string(),
            }
        } else {
            error!(key = %key, error = %e, "asset read failed");
            AssetError::Io(e)
        }
    }
}
