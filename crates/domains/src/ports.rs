//! # Ports
//!
//! Any storage adapter must implement these traits to be wired into the
//! services. Mocks are generated for the lookup ports when the `testing`
//! feature is enabled.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::DomainResult;
use crate::models::{Board, NewReply, Reply, ReplyTreeRow, User};

/// Read side of the reply store plus the entry point for transactions.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReplyStore: Send + Sync {
    /// Opens a storage transaction for one mutating operation.
    async fn begin(&self) -> DomainResult<Box<dyn ReplyTransaction>>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reply>>;

    /// Flat, depth-annotated rows for one board, in path order.
    ///
    /// Every row's parent precedes it. Rows deeper than `max_depth` are
    /// not returned.
    async fn find_tree_rows(
        &self,
        board_id: Uuid,
        max_depth: u32,
    ) -> DomainResult<Vec<ReplyTreeRow>>;

    /// Non-tombstoned replies on a board.
    async fn count_for_board(&self, board_id: Uuid) -> DomainResult<u64>;
}

/// One storage transaction. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait ReplyTransaction: Send {
    async fn find_by_id(&mut self, id: Uuid) -> DomainResult<Option<Reply>>;

    /// Immediate children only.
    async fn find_direct_children(&mut self, parent_id: Uuid) -> DomainResult<Vec<Reply>>;

    /// Fails with `ConstraintViolation` on blank/oversized content or a
    /// dangling reference.
    async fn insert(&mut self, reply: NewReply) -> DomainResult<Reply>;

    async fn update_content(&mut self, id: Uuid, content: &str) -> DomainResult<Reply>;

    async fn mark_deleted(&mut self, id: Uuid) -> DomainResult<Reply>;

    /// Physically removes one row. Never cascades.
    async fn remove(&mut self, id: Uuid) -> DomainResult<()>;

    async fn commit(self: Box<Self>) -> DomainResult<()>;
}

/// Discussion lookup and its view counter.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BoardRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Board>>;

    /// `view_count = view_count + 1 WHERE id = :id`; returns rows affected.
    async fn increment_view_count(&self, id: Uuid) -> DomainResult<u64>;
}

/// Author lookup.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>>;
}
