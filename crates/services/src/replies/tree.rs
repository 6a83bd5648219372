//! # Reply forest assembly
//!
//! Turns the flat, path-ordered rows of the recursive read into a forest.
//! Nodes live in an arena and refer to their children by index, so the
//! structure never holds parent/child references to itself.

use std::collections::HashMap;

use domains::{DomainError, DomainResult, ReplyTree, ReplyTreeRow, ReplyView};
use uuid::Uuid;

#[derive(Debug)]
struct ArenaNode {
    view: ReplyView,
    children: Vec<usize>,
}

/// Arena-backed forest of replies for one board.
#[derive(Debug, Default)]
pub struct ReplyForest {
    nodes: Vec<ArenaNode>,
    roots: Vec<usize>,
    index: HashMap<Uuid, usize>,
}

impl ReplyForest {
    /// Single pass over rows in path order.
    ///
    /// A row whose parent has not been seen yet, or a repeated id, means the
    /// query broke its ordering contract and is reported as `Internal`.
    pub fn assemble(board_id: Uuid, rows: Vec<ReplyTreeRow>) -> DomainResult<Self> {
        let mut forest = Self {
            nodes: Vec::with_capacity(rows.len()),
            roots: Vec::new(),
            index: HashMap::with_capacity(rows.len()),
        };

        for row in rows {
            let slot = forest.nodes.len();
            if forest.index.insert(row.id, slot).is_some() {
                return Err(DomainError::Internal(format!(
                    "reply {} appears twice in the tree rows",
                    row.id
                )));
            }

            match row.parent_id {
                None => forest.roots.push(slot),
                Some(parent_id) => {
                    let parent = forest.index.get(&parent_id).copied().ok_or_else(|| {
                        DomainError::Internal(format!(
                            "reply {} arrived before its parent {parent_id}",
                            row.id
                        ))
                    })?;
                    forest.nodes[parent].children.push(slot);
                }
            }

            forest.nodes.push(ArenaNode {
                view: ReplyView::from_row(row, board_id),
                children: Vec::new(),
            });
        }

        Ok(forest)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_ids(&self) -> Vec<Uuid> {
        self.roots.iter().map(|&i| self.nodes[i].view.id).collect()
    }

    /// Direct children of `id`, in row order. `None` if `id` is not in the forest.
    pub fn child_ids(&self, id: Uuid) -> Option<Vec<Uuid>> {
        let slot = *self.index.get(&id)?;
        Some(
            self.nodes[slot]
                .children
                .iter()
                .map(|&c| self.nodes[c].view.id)
                .collect(),
        )
    }

    /// Materializes nested views.
    ///
    /// Children always sit at a higher index than their parent, so walking
    /// the arena backwards finishes every subtree before its parent needs it.
    pub fn into_tree(self) -> ReplyTree {
        let total_count = self.nodes.len();
        let mut built: Vec<Option<ReplyView>> = Vec::with_capacity(total_count);
        let mut child_slots: Vec<Vec<usize>> = Vec::with_capacity(total_count);
        for node in self.nodes {
            built.push(Some(node.view));
            child_slots.push(node.children);
        }

        for slot in (0..total_count).rev() {
            let children: Vec<ReplyView> = child_slots[slot]
                .iter()
                .filter_map(|&c| built[c].take())
                .collect();
            if let Some(view) = built[slot].as_mut() {
                view.children = children;
            }
        }

        let replies = self
            .roots
            .iter()
            .filter_map(|&r| built[r].take())
            .collect();

        ReplyTree {
            replies,
            total_count,
        }
    }
}
