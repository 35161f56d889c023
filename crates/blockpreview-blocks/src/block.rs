//! Blocks and their wire shape.
//!
//! The persistence collaborator hands over [`RawBlock`]s: a flat JSON object
//! with an open-ended `type` string.  [`Block::try_from`] is the single place
//! where that string is matched against the closed set of [`BlockKind`]s;
//! anything else is rejected before it can reach the code generator.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::{CssColor, FontSize, HeadingLevel};
use crate::error::{BlockError, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Store ids arrive either as strings or as serial integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Serial(i64),
}

impl From<IdRepr> for String {
    fn from(repr: IdRepr) -> Self {
        match repr {
            IdRepr::Text(s) => s,
            IdRepr::Serial(n) => n.to_string(),
        }
    }
}

/// Identifier of a block, unique within its project.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "IdRepr", into = "String")]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IdRepr> for BlockId {
    fn from(repr: IdRepr) -> Self {
        Self(repr.into())
    }
}

impl From<BlockId> for String {
    fn from(id: BlockId) -> Self {
        id.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the project a block belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "IdRepr", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IdRepr> for ProjectId {
    fn from(repr: IdRepr) -> Self {
        Self(repr.into())
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// A block exactly as the persistence collaborator stores it.
///
/// Type-specific fields (`content`, `level`, `url`, ...) are kept in
/// `payload`.  A payload may also be nested as an object under `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub parent_id: Option<BlockId>,
    #[serde(default)]
    pub sort_index: i64,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Typed blocks
// ---------------------------------------------------------------------------

/// The closed set of block variants the pipeline knows how to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BlockKind {
    Text {
        content: String,
    },
    Heading {
        level: HeadingLevel,
        content: String,
    },
    Image {
        url: String,
        alt_text: String,
    },
    Link {
        url: String,
        text: String,
    },
    Color {
        value: CssColor,
        content: String,
    },
    FontSize {
        size: FontSize,
        content: String,
    },
}

impl BlockKind {
    /// Every `type` string accepted on the wire.
    pub const SUPPORTED_TYPES: &'static [&'static str] =
        &["text", "heading", "image", "link", "color", "font-size"];

    /// The wire name of this variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Heading { .. } => "heading",
            Self::Image { .. } => "image",
            Self::Link { .. } => "link",
            Self::Color { .. } => "color",
            Self::FontSize { .. } => "font-size",
        }
    }
}

/// A validated block.  Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub project_id: Option<ProjectId>,
    pub parent_id: Option<BlockId>,
    pub sort_index: i64,
    pub kind: BlockKind,
}

impl Block {
    /// Create a root-level block with sort index 0.
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: BlockId::new(id),
            project_id: None,
            parent_id: None,
            sort_index: 0,
            kind,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_id = Some(BlockId::new(parent));
        self
    }

    pub fn with_sort_index(mut self, sort_index: i64) -> Self {
        self.sort_index = sort_index;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project_id = Some(ProjectId::new(project));
        self
    }
}

#[derive(Deserialize)]
struct TextPayload {
    content: String,
}

#[derive(Deserialize)]
struct HeadingPayload {
    level: u8,
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload {
    url: String,
    #[serde(default, alias = "alt")]
    alt_text: Option<String>,
}

#[derive(Deserialize)]
struct LinkPayload {
    url: String,
    text: String,
}

#[derive(Deserialize)]
struct ColorPayload {
    value: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct FontSizePayload {
    size: u16,
    #[serde(default)]
    content: String,
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    block_id: &BlockId,
    payload: Map<String, Value>,
) -> Result<T> {
    // A payload stored as `{"content": {...}}` is unwrapped first.
    let payload = match payload.get("content") {
        Some(Value::Object(inner)) if payload.len() == 1 => inner.clone(),
        _ => payload,
    };
    serde_json::from_value(Value::Object(payload)).map_err(|e| BlockError::InvalidContent {
        block_id: block_id.clone(),
        reason: e.to_string(),
    })
}

fn invalid(block_id: &BlockId, reason: impl Into<String>) -> BlockError {
    BlockError::InvalidContent {
        block_id: block_id.clone(),
        reason: reason.into(),
    }
}

impl TryFrom<RawBlock> for Block {
    type Error = BlockError;

    fn try_from(raw: RawBlock) -> Result<Self> {
        let RawBlock {
            id,
            project_id,
            parent_id,
            sort_index,
            block_type,
            payload,
        } = raw;

        let kind = match block_type.as_str() {
            "text" => {
                let p: TextPayload = parse_payload(&id, payload)?;
                BlockKind::Text { content: p.content }
            }
            "heading" => {
                let p: HeadingPayload = parse_payload(&id, payload)?;
                let level = HeadingLevel::new(p.level).ok_or_else(|| {
                    invalid(&id, format!("heading level {} is outside 1..=6", p.level))
                })?;
                BlockKind::Heading {
                    level,
                    content: p.content,
                }
            }
            "image" => {
                let p: ImagePayload = parse_payload(&id, payload)?;
                BlockKind::Image {
                    url: p.url,
                    alt_text: p.alt_text.unwrap_or_default(),
                }
            }
            "link" => {
                let p: LinkPayload = parse_payload(&id, payload)?;
                BlockKind::Link {
                    url: p.url,
                    text: p.text,
                }
            }
            "color" => {
                let p: ColorPayload = parse_payload(&id, payload)?;
                let value = CssColor::parse(&p.value)
                    .ok_or_else(|| invalid(&id, "colour must be hex or a keyword"))?;
                BlockKind::Color {
                    value,
                    content: p.content,
                }
            }
            "font-size" => {
                let p: FontSizePayload = parse_payload(&id, payload)?;
                let size = FontSize::new(p.size).ok_or_else(|| {
                    invalid(&id, format!("font size {} is outside 1..=512", p.size))
                })?;
                BlockKind::FontSize {
                    size,
                    content: p.content,
                }
            }
            other => {
                tracing::warn!(block_id = %id, block_type = other, "rejecting unsupported block type");
                return Err(BlockError::UnsupportedBlockType {
                    block_id: id,
                    block_type: other.to_owned(),
                });
            }
        };

        Ok(Self {
            id,
            project_id,
            parent_id,
            sort_index,
            kind,
        })
    }
}

/// Convert every raw block, failing on the first invalid one.
///
/// Nothing is returned unless all blocks convert, so a single unsupported
/// type rejects the whole project.
pub fn parse_blocks(raw: impl IntoIterator<Item = RawBlock>) -> Result<Vec<Block>> {
    raw.into_iter().map(Block::try_from).collect()
}
