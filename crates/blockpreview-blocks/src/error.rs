//! Block model error types.
//!
//! Every structural problem found while reading a project's blocks surfaces
//! through [`BlockError`].  Generation never falls back to partial output, so
//! callers receive one of these and render nothing.

use crate::block::BlockId;

/// A structural defect that makes a project's blocks unusable as a forest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeDefect {
    /// A block names a parent that does not exist in the project.
    #[error("block {block_id} references missing parent {parent_id}")]
    MissingParent { block_id: BlockId, parent_id: BlockId },

    /// Following `parent_id` links from this block leads back to it.
    #[error("cycle detected through block {block_id}")]
    Cycle { block_id: BlockId },

    /// Two siblings share the same `sort_index`.
    #[error("siblings under {parent} share sort index {sort_index}")]
    DuplicateSortIndex {
        /// The common parent, or `"<root>"` for root-level blocks.
        parent: String,
        sort_index: i64,
    },

    /// Two blocks in one project share an id.
    #[error("duplicate block id {block_id}")]
    DuplicateId { block_id: BlockId },

    /// A subtree traversal was requested for a block outside the project.
    #[error("unknown block {block_id}")]
    UnknownBlock { block_id: BlockId },
}

/// Unified error type for the block model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    /// The project's blocks do not form a well-ordered forest.
    #[error("malformed block tree: {0}")]
    MalformedTree(#[from] TreeDefect),

    /// The block's `type` is not part of the supported set.
    #[error("unsupported block type `{block_type}` on block {block_id}")]
    UnsupportedBlockType {
        block_id: BlockId,
        block_type: String,
    },

    /// The block's payload does not fit its type.
    #[error("invalid content on block {block_id}: {reason}")]
    InvalidContent { block_id: BlockId, reason: String },
}

/// Convenience alias used throughout the blocks crate.
pub type Result<T> = std::result::Result<T, BlockError>;
