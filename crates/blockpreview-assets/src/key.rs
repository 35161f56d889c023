//! Asset keys.
//!
//! An [`AssetKey`] is a relative, slash-separated path made of
//! `[A-Za-z0-9._-]` segments.  Parsing is purely lexical; whether the key
//! stays inside the asset root once symlinks are followed is checked by the
//! proxy.

use std::fmt;
use std::path::PathBuf;

use crate::error::{AssetError, Result};

/// Longest accepted key, in bytes.
pub const MAX_KEY_LEN: usize = 512;

/// A validated asset key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey(String);

impl AssetKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let reject = |reason| Err(AssetError::InvalidKey { reason });

        if raw.is_empty() {
            return reject("empty key");
        }
        if raw.len() > MAX_KEY_LEN {
            return reject("key too long");
        }
        if raw.chars().any(char::is_control) {
            return reject("control character");
        }
        if raw.contains('\\') {
            return reject("backslash");
        }
        if raw.starts_with('/') {
            return reject("absolute key");
        }
        let bytes = raw.as_bytes();
        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            return reject("drive prefix");
        }

        for segment in raw.split('/') {
            match segment {
                "" => return reject("empty segment"),
                "." | ".." => return reject("relative segment"),
                s if s.starts_with('.') => return reject("hidden segment"),
                s if !s.bytes().all(is_key_byte) => return reject("unsupported character"),
                _ => {}
            }
        }

        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased extension of the last segment, if any.
    pub fn extension(&self) -> Option<String> {
        let file = self.0.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
    }

    /// The key as a relative path.
    pub fn to_relative_path(&self) -> PathBuf {
        self.0.split('/').collect()
    }
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
