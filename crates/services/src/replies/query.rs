//! # ReplyQueryService
//!
//! Read side of the reply tree.

use std::sync::Arc;

use domains::{DomainResult, ReplyStore, ReplyTree};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::tree::ReplyForest;

pub struct ReplyQueryService {
    replies: Arc<dyn ReplyStore>,
    max_depth: u32,
}

impl ReplyQueryService {
    pub fn new(replies: Arc<dyn ReplyStore>, max_depth: u32) -> Self {
        Self { replies, max_depth }
    }

    /// Every reply on the board within the depth bound, tombstones included.
    #[instrument(skip(self))]
    pub async fn reply_tree(&self, board_id: Uuid) -> DomainResult<ReplyTree> {
        let rows = self.replies.find_tree_rows(board_id, self.max_depth).await?;
        if rows.is_empty() {
            return Ok(ReplyTree::empty());
        }

        let forest = ReplyForest::assemble(board_id, rows)?;
        debug!(rows = forest.len(), roots = forest.root_ids().len(), "reply tree assembled");
        Ok(forest.into_tree())
    }

    /// Replies on the board that are not tombstoned.
    pub async fn count_for_board(&self, board_id: Uuid) -> DomainResult<u64> {
        self.replies.count_for_board(board_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{DomainError, MockReplyStore, ReplyTreeRow};
    use mockall::predicate::{always, eq};

    fn row(id: Uuid, parent_id: Option<Uuid>, depth: u32) -> ReplyTreeRow {
        ReplyTreeRow {
            id,
            parent_id,
            content: "text".into(),
            author_id: Uuid::nil(),
            author_name: "alice".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted: false,
            depth,
        }
    }

    #[tokio::test]
    async fn passes_the_configured_depth_to_the_store() {
        let mut store = MockReplyStore::new();
        store
            .expect_find_tree_rows()
            .with(always(), eq(3u32))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let svc = ReplyQueryService::new(Arc::new(store), 3);
        let tree = svc.reply_tree(Uuid::now_v7()).await.unwrap();
        assert_eq!(tree, ReplyTree::empty());
    }

    #[tokio::test]
    async fn builds_the_forest_from_store_rows() {
        let (root, child) = (Uuid::now_v7(), Uuid::now_v7());
        let mut store = MockReplyStore::new();
        store
            .expect_find_tree_rows()
            .returning(move |_, _| Ok(vec![row(root, None, 0), row(child, Some(root), 1)]));

        let svc = ReplyQueryService::new(Arc::new(store), 5);
        let tree = svc.reply_tree(Uuid::now_v7()).await.unwrap();
        assert_eq!(tree.total_count, 2);
        assert_eq!(tree.replies[0].children[0].id, child);
    }

    #[tokio::test]
    async fn malformed_rows_surface_as_internal_errors() {
        let mut store = MockReplyStore::new();
        store
            .expect_find_tree_rows()
            .returning(|_, _| Ok(vec![row(Uuid::now_v7(), Some(Uuid::now_v7()), 1)]));

        let svc = ReplyQueryService::new(Arc::new(store), 5);
        let err = svc.reply_tree(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, DomainError::Internal(_)));
    }
}
