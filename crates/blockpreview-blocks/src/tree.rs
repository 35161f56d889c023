//! Read-only traversal over a project's block forest.
//!
//! [`BlockTree::build`] checks the structural invariants up front (unique
//! ids, existing parents, unique sibling sort indices, no cycles) and then
//! exposes the blocks in sibling-sorted, depth-first order.  The persistence
//! layer does not enforce acyclicity on write, so the walk keeps a visited
//! set instead of trusting it.

use std::collections::{HashMap, HashSet};

use crate::block::{Block, BlockId, ProjectId};
use crate::error::{Result, TreeDefect};

/// A block together with its depth in the forest (roots have depth 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversedBlock<'a> {
    pub block: &'a Block,
    pub depth: usize,
}

/// A validated forest of blocks belonging to one project.
#[derive(Debug, Clone)]
pub struct BlockTree {
    project_id: Option<ProjectId>,
    blocks: Vec<Block>,
    /// Indices into `blocks` in traversal order, paired with depth.
    order: Vec<(usize, usize)>,
    /// Position of each block id within `order`.
    position: HashMap<BlockId, usize>,
}

impl BlockTree {
    /// Build the tree for `project_id` from `blocks`.
    ///
    /// Blocks tagged with a different project are ignored; blocks without a
    /// project tag are assumed to belong to the requested one.  Passing
    /// `None` keeps every block.
    pub fn build(project_id: Option<ProjectId>, blocks: Vec<Block>) -> Result<Self> {
        let blocks: Vec<Block> = blocks
            .into_iter()
            .filter(|b| match (&project_id, &b.project_id) {
                (Some(want), Some(have)) => want == have,
                _ => true,
            })
            .collect();

        let mut index: HashMap<&BlockId, usize> = HashMap::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            if index.insert(&block.id, i).is_some() {
                return Err(TreeDefect::DuplicateId {
                    block_id: block.id.clone(),
                }
                .into());
            }
        }

        // Group children under their parent (None = root level).
        let mut children: HashMap<Option<&BlockId>, Vec<usize>> = HashMap::new();
        for (i, block) in blocks.iter().enumerate() {
            if let Some(parent) = &block.parent_id {
                if !index.contains_key(parent) {
                    return Err(TreeDefect::MissingParent {
                        block_id: block.id.clone(),
                        parent_id: parent.clone(),
                    }
                    .into());
                }
            }
            children.entry(block.parent_id.as_ref()).or_default().push(i);
        }

        for (parent, siblings) in children.iter_mut() {
            siblings.sort_by_key(|&i| blocks[i].sort_index);
            if let Some(pair) = siblings
                .windows(2)
                .find(|w| blocks[w[0]].sort_index == blocks[w[1]].sort_index)
            {
                return Err(TreeDefect::DuplicateSortIndex {
                    parent: parent.map_or_else(|| "<root>".to_owned(), ToString::to_string),
                    sort_index: blocks[pair[0]].sort_index,
                }
                .into());
            }
        }

        // Iterative depth-first walk from the roots.
        let mut order = Vec::with_capacity(blocks.len());
        let mut visited: HashSet<usize> = HashSet::with_capacity(blocks.len());
        let mut stack: Vec<(usize, usize)> = children
            .get(&None)
            .map(|roots| roots.iter().rev().map(|&i| (i, 0)).collect())
            .unwrap_or_default();

        while let Some((i, depth)) = stack.pop() {
            if !visited.insert(i) {
                return Err(TreeDefect::Cycle {
                    block_id: blocks[i].id.clone(),
                }
                .into());
            }
            order.push((i, depth));
            if let Some(kids) = children.get(&Some(&blocks[i].id)) {
                stack.extend(kids.iter().rev().map(|&k| (k, depth + 1)));
            }
        }

        // Every parent exists, so anything not reached from a root hangs off
        // a cycle.
        if let Some(stranded) = (0..blocks.len()).find(|i| !visited.contains(i)) {
            let block_id = blocks[stranded].id.clone();
            tracing::warn!(block_id = %block_id, "block tree contains a cycle");
            return Err(TreeDefect::Cycle { block_id }.into());
        }

        let position = order
            .iter()
            .enumerate()
            .map(|(pos, &(i, _))| (blocks[i].id.clone(), pos))
            .collect();

        tracing::debug!(
            project_id = ?project_id.as_ref().map(ProjectId::as_str),
            blocks = blocks.len(),
            "block tree built"
        );

        Ok(Self {
            project_id,
            blocks,
            order,
            position,
        })
    }

    pub fn project_id(&self) -> Option<&ProjectId> {
        self.project_id.as_ref()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.position.get(id).map(|&pos| &self.blocks[self.order[pos].0])
    }

    /// All blocks, sibling-sorted depth-first.
    pub fn traverse(&self) -> impl Iterator<Item = TraversedBlock<'_>> + '_ {
        self.order.iter().map(|&(i, depth)| TraversedBlock {
            block: &self.blocks[i],
            depth,
        })
    }

    /// `root` and its descendants, in the same order as [`traverse`].
    ///
    /// Depths stay relative to the whole forest.
    ///
    /// [`traverse`]: Self::traverse
    pub fn subtree(&self, root: &BlockId) -> Result<Vec<TraversedBlock<'_>>> {
        let start = *self
            .position
            .get(root)
            .ok_or_else(|| TreeDefect::UnknownBlock {
                block_id: root.clone(),
            })?;
        let root_depth = self.order[start].1;

        // Descendants are exactly the contiguous run of deeper entries.
        let end = self.order[start + 1..]
            .iter()
            .position(|&(_, depth)| depth <= root_depth)
            .map_or(self.order.len(), |offset| start + 1 + offset);

        Ok(self.order[start..end]
            .iter()
            .map(|&(i, depth)| TraversedBlock {
                block: &self.blocks[i],
                depth,
            })
            .collect())
    }
}
