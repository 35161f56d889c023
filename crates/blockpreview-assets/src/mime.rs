//! Fixed extension-to-MIME table.

use crate::key::AssetKey;

/// Served for every extension not in the table.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const MIME_TABLE: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("bmp", "image/bmp"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("woff2", "font/woff2"),
    ("css", "text/css"),
    ("txt", "text/plain"),
];

/// Content type for a key, decided by its extension alone.
pub fn content_type_for(key: &AssetKey) -> &'static str {
    key.extension()
        .and_then(|ext| {
            MIME_TABLE
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|&(_, mime)| mime)
        })
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
