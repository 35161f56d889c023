//! BlockPreview block model.
//!
//! This crate is the read-only query surface over a student project's
//! blocks:
//!
//! - **[`block`]** -- [`RawBlock`] (the persisted wire shape), [`Block`] and
//!   the closed [`BlockKind`] variant set.
//! - **[`content`]** -- validated payload values ([`HeadingLevel`],
//!   [`CssColor`], [`FontSize`]).
//! - **[`tree`]** -- [`BlockTree`], a checked forest with sibling-sorted
//!   depth-first traversal.
//! - **[`error`]** -- [`BlockError`] and [`TreeDefect`].
//!
//! The pipeline never mutates blocks; they are owned by the persistence
//! collaborator.

pub mod block;
pub mod content;
pub mod error;
pub mod tree;

pub use block::{Block, BlockId, BlockKind, ProjectId, RawBlock, parse_blocks};
pub use content::{CssColor, FontSize, HeadingLevel};
pub use error::{BlockError, Result, TreeDefect};
pub use tree::{BlockTree, TraversedBlock};
