//! Block model -> code generator -> sanitizer.
//!
//! The only way the preview obtains markup.  Any failure yields an error and
//! no markup at all; there is no partial or unsanitized fallback.

use blockpreview_blocks::{BlockTree, ProjectId, RawBlock, parse_blocks};
use blockpreview_codegen::{LineMapping, generate_tree};
use blockpreview_sanitize::{SafeMarkup, SanitizePolicy, sanitize};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;

/// Safe markup plus the mapping from its lines back to blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPreview {
    pub markup: SafeMarkup,
    pub mapping: LineMapping,
}

/// Renders projects under a fixed sanitize policy.
#[derive(Debug, Clone, Default)]
pub struct PreviewPipeline {
    policy: SanitizePolicy,
}

impl PreviewPipeline {
    pub fn new(policy: SanitizePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SanitizePolicy {
        &self.policy
    }

    /// Render wire blocks.  When `project_id` is given, blocks tagged with
    /// another project are ignored.
    pub fn render(&self, project_id: Option<ProjectId>, raw: Vec<RawBlock>) -> Result<RenderedPreview> {
        let blocks = parse_blocks(raw)?;
        let tree = BlockTree::build(project_id, blocks)?;
        Ok(self.render_tree(&tree))
    }

    /// The sanitizer keeps line breaks of removed content, so the generated
    /// mapping addresses the safe markup line for line.
    pub fn render_tree(&self, tree: &BlockTree) -> RenderedPreview {
        let generated = generate_tree(tree);
        let markup = sanitize(&generated.markup, &self.policy);

        let lines = if markup.is_empty() {
            0
        } else {
            markup.as_str().split('\n').count()
        };
        let mapping = if lines == generated.mapping.line_count() {
            generated.mapping
        } else {
            warn!(
                generated = generated.mapping.line_count(),
                sanitized = lines,
                "sanitizer changed line count; mapping dropped"
            );
            LineMapping::new()
        };
        debug!(blocks = tree.len(), bytes = markup.len(), "preview rendered");

        RenderedPreview { markup, mapping }
    }
}
