//! Line mapping between generated markup and source blocks.
//!
//! Lines are numbered from 1.  Ranges are inclusive, appended in generation
//! order, and together they cover every line of the output exactly once.

use blockpreview_blocks::BlockId;
use serde::{Deserialize, Serialize};

/// The lines one block occupies in the generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRange {
    pub block_id: BlockId,
    pub start_line: usize,
    pub end_line: usize,
}

impl LineRange {
    pub fn contains(&self, line: usize) -> bool {
        (self.start_line..=self.end_line).contains(&line)
    }

    /// Number of lines in the range (always at least one).
    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }
}

/// Ordered `block id -> line range` association.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineMapping {
    ranges: Vec<LineRange>,
}

impl LineMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the next block's range.  Ranges must be pushed in output order
    /// and start right after the previous one.
    pub(crate) fn push(&mut self, block_id: BlockId, line_count: usize) {
        let start_line = self.line_count() + 1;
        self.ranges.push(LineRange {
            block_id,
            start_line,
            end_line: start_line + line_count - 1,
        });
    }

    /// Total number of lines covered.
    pub fn line_count(&self) -> usize {
        self.ranges.last().map_or(0, |r| r.end_line)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LineRange> {
        self.ranges.iter()
    }

    /// The block that produced `line`, used by the code view to map a click
    /// back to the editor.
    pub fn block_at_line(&self, line: usize) -> Option<&BlockId> {
        let idx = self.ranges.partition_point(|r| r.end_line < line);
        self.ranges
            .get(idx)
            .filter(|r| r.contains(line))
            .map(|r| &r.block_id)
    }

    pub fn range_of(&self, block_id: &BlockId) -> Option<&LineRange> {
        self.ranges.iter().find(|r| &r.block_id == block_id)
    }
}

impl<'a> IntoIterator for &'a LineMapping {
    type Item = &'a LineRange;
    type IntoIter = std::slice::Iter<'a, LineRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
