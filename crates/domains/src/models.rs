//! # Domain Models
//!
//! These structs represent the entities the reply subsystem touches.
//! We use UUID v7 for time-ordered, globally unique identification, which
//! also makes sibling replies sort by creation when ordered by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered author. Only the fields replies need are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A discussion that owns replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: Uuid,
    pub title: String,
    pub author_id: Uuid,
    /// Mutated only through an atomic increment in storage
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted reply node.
///
/// `board_id`, `parent_id` and `author_id` never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    pub board_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
    /// Tombstone flag: the node stays so its children remain attached
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a reply. Timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReply {
    pub id: Uuid,
    pub board_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub content: String,
}

impl NewReply {
    pub fn new(board_id: Uuid, parent_id: Option<Uuid>, author_id: Uuid, content: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            board_id,
            parent_id,
            author_id,
            content,
        }
    }
}

/// One row of the depth-bounded recursive read, in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTreeRow {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
    /// 0 for roots
    pub depth: u32,
}

/// Materialized reply returned to callers, with its nested children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyView {
    pub id: Uuid,
    pub board_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub author_id: Uuid,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
    pub depth: u32,
    pub children: Vec<ReplyView>,
}

impl ReplyView {
    /// Single-node view. Depth is only computed for tree reads, so it is 0 here.
    pub fn from_reply(reply: Reply, author_name: impl Into<String>) -> Self {
        Self {
            id: reply.id,
            board_id: reply.board_id,
            parent_id: reply.parent_id,
            content: reply.content,
            author_id: reply.author_id,
            author_name: author_name.into(),
            created_at: reply.created_at,
            updated_at: reply.updated_at,
            deleted: reply.deleted,
            depth: 0,
            children: Vec::new(),
        }
    }

    pub fn from_row(row: ReplyTreeRow, board_id: Uuid) -> Self {
        Self {
            id: row.id,
            board_id,
            parent_id: row.parent_id,
            content: row.content,
            author_id: row.author_id,
            author_name: row.author_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted: row.deleted,
            depth: row.depth,
            children: Vec::new(),
        }
    }

    /// Content to render; tombstoned replies show nothing.
    pub fn display_content(&self) -> Option<&str> {
        (!self.deleted).then_some(self.content.as_str())
    }

    /// This node plus all of its descendants.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(ReplyView::subtree_len).sum::<usize>()
    }
}

/// Result of a tree read for one discussion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyTree {
    pub replies: Vec<ReplyView>,
    /// Number of rows fetched, tombstones included
    pub total_count: usize,
}

impl ReplyTree {
    pub fn empty() -> Self {
        Self {
            replies: Vec::new(),
            total_count: 0,
        }
    }

    /// Depth-first search across the forest.
    pub fn find(&self, id: Uuid) -> Option<&ReplyView> {
        let mut stack: Vec<&ReplyView> = self.replies.iter().collect();
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }
}

/// Signal published by the read path when a discussion is viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewedEvent {
    pub board_id: Uuid,
}
