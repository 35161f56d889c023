//! BlockPreview code generator.
//!
//! Compiles traversal-ordered blocks into markup and a reversible
//! [`LineMapping`]:
//!
//! - **[`generator`]** -- [`generate`], [`generate_tree`] and
//!   [`generate_raw`].  Pure and deterministic: identical block sequences
//!   always yield byte-identical markup and identical mappings.
//! - **[`mapping`]** -- [`LineMapping`] and [`LineRange`], including the
//!   line-to-block lookup used by the read-only code view.
//!
//! Generator output is not yet safe to render; it must pass through the
//! sanitizer first.

pub mod generator;
pub mod mapping;

pub use generator::{GeneratedMarkup, generate, generate_raw, generate_tree};
pub use mapping::{LineMapping, LineRange};
