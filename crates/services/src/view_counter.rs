//! # View counter
//!
//! Applies "board viewed" signals to the board's counter off the read path.
//!
//! The read path only calls [`ViewSignalPublisher::publish`], which never
//! waits. A background worker drains the queue and runs one atomic increment
//! per signal, retrying transient write conflicts a bounded number of times
//! with no backoff. The counter is best-effort: a full queue or an exhausted
//! retry budget loses that view, and nothing is ever reported to the reader.

use std::sync::Arc;

use domains::{BoardRepository, ViewedEvent};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How one signal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCountOutcome {
    Incremented { attempts: u32 },
    /// Zero rows matched; terminal, never retried
    BoardMissing,
    /// Every attempt hit a transient conflict
    Dropped { attempts: u32 },
    /// A non-transient storage error ended the attempt early
    Failed { attempts: u32 },
}

#[derive(Clone)]
pub struct ViewCounterUpdater {
    boards: Arc<dyn BoardRepository>,
    max_attempts: u32,
}

impl ViewCounterUpdater {
    pub fn new(boards: Arc<dyn BoardRepository>, max_attempts: u32) -> Self {
        Self {
            boards,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn on_viewed(&self, event: ViewedEvent) -> ViewCountOutcome {
        let board_id = event.board_id;

        for attempt in 1..=self.max_attempts {
            match self.boards.increment_view_count(board_id).await {
                Ok(0) => {
                    debug!(%board_id, "view count skipped, board no longer exists");
                    return ViewCountOutcome::BoardMissing;
                }
                Ok(_) => return ViewCountOutcome::Incremented { attempts: attempt },
                Err(err) if err.is_transient() => {
                    if attempt == self.max_attempts {
                        warn!(
                            %board_id,
                            attempts = attempt,
                            error = %err,
                            "view count dropped after retries"
                        );
                        return ViewCountOutcome::Dropped { attempts: attempt };
                    }
                    debug!(
                        %board_id,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "retrying view count"
                    );
                }
                Err(err) => {
                    warn!(%board_id, attempt, error = %err, "view count failed");
                    return ViewCountOutcome::Failed { attempts: attempt };
                }
            }
        }

        ViewCountOutcome::Dropped {
            attempts: self.max_attempts,
        }
    }
}

/// Cheap, cloneable handle the read path uses to emit view signals.
#[derive(Clone)]
pub struct ViewSignalPublisher {
    tx: mpsc::Sender<ViewedEvent>,
}

impl ViewSignalPublisher {
    /// Enqueues without waiting. Returns `false` when the signal was discarded.
    pub fn publish(&self, event: ViewedEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(board_id = %event.board_id, "view signal dropped, queue full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(board_id = %event.board_id, "view signal dropped, worker stopped");
                false
            }
        }
    }
}

/// Starts the worker on the current runtime.
///
/// The worker stops once every publisher clone is dropped and the queue is
/// empty; the returned handle resolves after in-flight increments finish.
pub fn spawn_view_counter(
    updater: ViewCounterUpdater,
    queue_capacity: usize,
    concurrency: usize,
) -> (ViewSignalPublisher, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let handle = tokio::spawn(run_worker(updater, rx, concurrency.max(1)));
    (ViewSignalPublisher { tx }, handle)
}

async fn run_worker(
    updater: ViewCounterUpdater,
    mut rx: mpsc::Receiver<ViewedEvent>,
    concurrency: usize,
) {
    let permits = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    while let Some(event) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let updater = updater.clone();
        tasks.spawn(async move {
            let _permit = permit;
            updater.on_viewed(event).await
        });

        while let Some(finished) = tasks.try_join_next() {
            reap(finished);
        }
    }

    while let Some(finished) = tasks.join_next().await {
        reap(finished);
    }
    debug!("view counter worker stopped");
}

fn reap(finished: Result<ViewCountOutcome, tokio::task::JoinError>) {
    if let Err(err) = finished {
        warn!(error = %err, "view counter task aborted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{DomainError, MockBoardRepository};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn event() -> ViewedEvent {
        ViewedEvent {
            board_id: Uuid::now_v7(),
        }
    }

    /// Fails with a write conflict `failures` times, then reports `rows`.
    fn flaky_boards(failures: u32, rows: u64) -> (MockBoardRepository, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let mut boards = MockBoardRepository::new();
        boards.expect_increment_view_count().returning(move |_| {
            let call = seen.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= failures {
                Err(DomainError::Conflict("could not serialize access".into()))
            } else {
                Ok(rows)
            }
        });
        (boards, calls)
    }

    #[tokio::test]
    async fn increments_once_on_success() {
        let (boards, calls) = flaky_boards(0, 1);
        let updater = ViewCounterUpdater::new(Arc::new(boards), 5);

        let outcome = updater.on_viewed(event()).await;
        assert_eq!(outcome, ViewCountOutcome::Incremented { attempts: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_conflicts_then_stops_on_success() {
        let (boards, calls) = flaky_boards(2, 1);
        let updater = ViewCounterUpdater::new(Arc::new(boards), 5);

        let outcome = updater.on_viewed(event()).await;
        assert_eq!(outcome, ViewCountOutcome::Incremented { attempts: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (boards, calls) = flaky_boards(u32::MAX, 1);
        let updater = ViewCounterUpdater::new(Arc::new(boards), DEFAULT_MAX_ATTEMPTS);

        let outcome = updater.on_viewed(event()).await;
        assert_eq!(outcome, ViewCountOutcome::Dropped { attempts: 5 });
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn missing_board_is_attempted_exactly_once() {
        let (boards, calls) = flaky_boards(0, 0);
        let updater = ViewCounterUpdater::new(Arc::new(boards), 5);

        let outcome = updater.on_viewed(event()).await;
        assert_eq!(outcome, ViewCountOutcome::BoardMissing);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let mut boards = MockBoardRepository::new();
        boards
            .expect_increment_view_count()
            .times(1)
            .returning(|_| Err(DomainError::Internal("syntax error".into())));
        let updater = ViewCounterUpdater::new(Arc::new(boards), 5);

        let outcome = updater.on_viewed(event()).await;
        assert_eq!(outcome, ViewCountOutcome::Failed { attempts: 1 });
    }

    #[tokio::test]
    async fn worker_drains_queue_and_stops_when_publishers_drop() {
        let (boards, calls) = flaky_boards(0, 1);
        let updater = ViewCounterUpdater::new(Arc::new(boards), 5);
        let (publisher, handle) = spawn_view_counter(updater, 16, 2);

        for _ in 0..10 {
            assert!(publisher.publish(event()));
        }
        drop(publisher);

        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn publish_reports_a_stopped_worker() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let publisher = ViewSignalPublisher { tx };
        assert!(!publisher.publish(event()));
    }

    #[tokio::test]
    async fn publish_never_waits_on_a_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let publisher = ViewSignalPublisher { tx };
        assert!(publisher.publish(event()));
        assert!(!publisher.publish(event()));
    }
}
