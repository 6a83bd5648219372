//! # BoardQueryService
//!
//! The discussion read path. Reading a board publishes a view signal and
//! returns immediately; the counter catches up in the background, so the
//! returned `view_count` does not include this read.

use std::sync::Arc;

use domains::{Board, BoardRepository, DomainError, DomainResult, ViewedEvent};
use tracing::instrument;
use uuid::Uuid;

use crate::view_counter::ViewSignalPublisher;

pub struct BoardQueryService {
    boards: Arc<dyn BoardRepository>,
    views: ViewSignalPublisher,
}

impl BoardQueryService {
    pub fn new(boards: Arc<dyn BoardRepository>, views: ViewSignalPublisher) -> Self {
        Self { boards, views }
    }

    #[instrument(skip(self))]
    pub async fn view(&self, board_id: Uuid) -> DomainResult<Board> {
        let board = self
            .boards
            .find_by_id(board_id)
            .await?
            .ok_or_else(|| DomainError::not_found("board", board_id))?;

        self.views.publish(ViewedEvent { board_id: board.id });
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_counter::{spawn_view_counter, ViewCounterUpdater};
    use chrono::Utc;
    use domains::MockBoardRepository;

    #[tokio::test]
    async fn missing_board_emits_no_signal() {
        let mut lookups = MockBoardRepository::new();
        lookups.expect_find_by_id().returning(|_| Ok(None));

        let mut counter = MockBoardRepository::new();
        counter.expect_increment_view_count().never();
        let updater = ViewCounterUpdater::new(Arc::new(counter), 5);
        let (views, handle) = spawn_view_counter(updater, 4, 1);

        let svc = BoardQueryService::new(Arc::new(lookups), views);
        let err = svc.view(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { resource: "board", .. }));

        drop(svc);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn viewing_a_board_signals_the_counter() {
        let board_id = Uuid::now_v7();
        let mut lookups = MockBoardRepository::new();
        lookups.expect_find_by_id().returning(|id| {
            Ok(Some(Board {
                id,
                title: "General".into(),
                author_id: Uuid::nil(),
                view_count: 7,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }))
        });

        let mut counter = MockBoardRepository::new();
        counter
            .expect_increment_view_count()
            .withf(move |id| *id == board_id)
            .times(1)
            .returning(|_| Ok(1));
        let updater = ViewCounterUpdater::new(Arc::new(counter), 5);
        let (views, handle) = spawn_view_counter(updater, 4, 1);

        let svc = BoardQueryService::new(Arc::new(lookups), views);
        let board = svc.view(board_id).await.unwrap();
        assert_eq!(board.view_count, 7);

        drop(svc);
        handle.await.unwrap();
    }
}
