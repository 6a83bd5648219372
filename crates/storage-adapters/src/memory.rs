//! # In-memory storage
//!
//! A process-local implementation of every port, used by tests and local
//! experiments. Users and boards live in `DashMap`s; replies sit behind a
//! `tokio::sync::Mutex` so a transaction holds the table for its whole
//! lifetime and works on a private copy that `commit` swaps in.
//!
//! Counter faults can be injected to exercise the retry path.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use domains::{
    validate_content, Board, BoardRepository, DomainError, DomainResult, NewReply, Reply,
    ReplyStore, ReplyTransaction, ReplyTreeRow, User, UserRepository,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Replies keyed by id. UUID v7 keys keep iteration in creation order.
type ReplyTable = BTreeMap<Uuid, Reply>;

#[derive(Default)]
pub struct MemoryDatabase {
    users: Arc<DashMap<Uuid, User>>,
    boards: Arc<DashMap<Uuid, Board>>,
    replies: Arc<Mutex<ReplyTable>>,
    pending_increment_faults: AtomicU32,
    increment_calls: AtomicU32,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, username: impl Into<String>) -> User {
        let user = User {
            id: Uuid::now_v7(),
            username: username.into(),
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn insert_board(&self, title: impl Into<String>, author_id: Uuid) -> Board {
        let now = Utc::now();
        let board = Board {
            id: Uuid::now_v7(),
            title: title.into(),
            author_id,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.boards.insert(board.id, board.clone());
        board
    }

    pub fn remove_board(&self, id: Uuid) {
        self.boards.remove(&id);
    }

    pub fn view_count(&self, board_id: Uuid) -> Option<i64> {
        self.boards.get(&board_id).map(|b| b.view_count)
    }

    /// The next `n` increments fail with a transient write conflict.
    pub fn fail_next_increments(&self, n: u32) {
        self.pending_increment_faults.store(n, Ordering::SeqCst);
    }

    /// Increment statements issued so far, failed ones included.
    pub fn increment_calls(&self) -> u32 {
        self.increment_calls.load(Ordering::SeqCst)
    }

    fn take_increment_fault(&self) -> bool {
        self.pending_increment_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ReplyStore for MemoryDatabase {
    async fn begin(&self) -> DomainResult<Box<dyn ReplyTransaction>> {
        let guard = self.replies.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            users: self.users.clone(),
            boards: self.boards.clone(),
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reply>> {
        Ok(self.replies.lock().await.get(&id).cloned())
    }

    async fn find_tree_rows(
        &self,
        board_id: Uuid,
        max_depth: u32,
    ) -> DomainResult<Vec<ReplyTreeRow>> {
        let table = self.replies.lock().await;

        let mut roots = Vec::new();
        let mut children: HashMap<Uuid, Vec<&Reply>> = HashMap::new();
        for reply in table.values().filter(|r| r.board_id == board_id) {
            match reply.parent_id {
                None => roots.push(reply),
                Some(parent_id) => children.entry(parent_id).or_default().push(reply),
            }
        }

        // Depth-first with siblings in id order: the same order as sorting
        // the id path array in SQL.
        let mut rows = Vec::new();
        let mut stack: Vec<(&Reply, u32)> = roots.into_iter().rev().map(|r| (r, 0)).collect();
        while let Some((reply, depth)) = stack.pop() {
            let author_name = self
                .users
                .get(&reply.author_id)
                .map(|u| u.username.clone())
                .ok_or_else(|| DomainError::Internal(format!("reply {} has no author", reply.id)))?;
            rows.push(ReplyTreeRow {
                id: reply.id,
                parent_id: reply.parent_id,
                content: reply.content.clone(),
                author_id: reply.author_id,
                author_name,
                created_at: reply.created_at,
                updated_at: reply.updated_at,
                deleted: reply.deleted,
                depth,
            });

            if depth < max_depth {
                if let Some(kids) = children.get(&reply.id) {
                    stack.extend(kids.iter().rev().map(|&k| (k, depth + 1)));
                }
            }
        }

        Ok(rows)
    }

    async fn count_for_board(&self, board_id: Uuid) -> DomainResult<u64> {
        let table = self.replies.lock().await;
        Ok(table
            .values()
            .filter(|r| r.board_id == board_id && !r.deleted)
            .count() as u64)
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<ReplyTable>,
    working: ReplyTable,
    users: Arc<DashMap<Uuid, User>>,
    boards: Arc<DashMap<Uuid, Board>>,
}

impl MemoryTransaction {
    fn get_mut(&mut self, id: Uuid) -> DomainResult<&mut Reply> {
        self.working
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("reply", id))
    }
}

#[async_trait]
impl ReplyTransaction for MemoryTransaction {
    async fn find_by_id(&mut self, id: Uuid) -> DomainResult<Option<Reply>> {
        Ok(self.working.get(&id).cloned())
    }

    async fn find_direct_children(&mut self, parent_id: Uuid) -> DomainResult<Vec<Reply>> {
        Ok(self
            .working
            .values()
            .filter(|r| r.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn insert(&mut self, reply: NewReply) -> DomainResult<Reply> {
        validate_content(&reply.content)?;
        if !self.boards.contains_key(&reply.board_id) {
            return Err(DomainError::ConstraintViolation(format!(
                "board {} does not exist",
                reply.board_id
            )));
        }
        if !self.users.contains_key(&reply.author_id) {
            return Err(DomainError::ConstraintViolation(format!(
                "author {} does not exist",
                reply.author_id
            )));
        }
        if let Some(parent_id) = reply.parent_id {
            if !self.working.contains_key(&parent_id) {
                return Err(DomainError::ConstraintViolation(format!(
                    "parent reply {parent_id} does not exist"
                )));
            }
        }
        if self.working.contains_key(&reply.id) {
            return Err(DomainError::ConstraintViolation(format!(
                "reply {} already exists",
                reply.id
            )));
        }

        let now = Utc::now();
        let saved = Reply {
            id: reply.id,
            board_id: reply.board_id,
            parent_id: reply.parent_id,
            author_id: reply.author_id,
            content: reply.content,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.working.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn update_content(&mut self, id: Uuid, content: &str) -> DomainResult<Reply> {
        validate_content(content)?;
        let reply = self.get_mut(id)?;
        reply.content = content.to_owned();
        reply.updated_at = Utc::now();
        Ok(reply.clone())
    }

    async fn mark_deleted(&mut self, id: Uuid) -> DomainResult<Reply> {
        let reply = self.get_mut(id)?;
        reply.deleted = true;
        reply.updated_at = Utc::now();
        Ok(reply.clone())
    }

    async fn remove(&mut self, id: Uuid) -> DomainResult<()> {
        if self.working.values().any(|r| r.parent_id == Some(id)) {
            return Err(DomainError::ConstraintViolation(format!(
                "reply {id} is still referenced by its children"
            )));
        }
        self.working
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("reply", id))
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl BoardRepository for MemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Board>> {
        Ok(self.boards.get(&id).map(|b| b.clone()))
    }

    async fn increment_view_count(&self, id: Uuid) -> DomainResult<u64> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_increment_fault() {
            return Err(DomainError::Conflict(format!(
                "concurrent update on board {id}"
            )));
        }

        match self.boards.get_mut(&id) {
            Some(mut board) => {
                board.view_count += 1;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryDatabase {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed() -> (MemoryDatabase, Board, User) {
        let db = MemoryDatabase::new();
        let user = db.insert_user("alice");
        let board = db.insert_board("General", user.id);
        (db, board, user)
    }

    async fn insert(
        db: &MemoryDatabase,
        board: &Board,
        user: &User,
        parent: Option<Uuid>,
    ) -> Reply {
        let mut tx = db.begin().await.unwrap();
        let reply = tx
            .insert(NewReply::new(board.id, parent, user.id, "text".into()))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        reply
    }

    #[tokio::test]
    async fn uncommitted_transactions_roll_back() {
        let (db, board, user) = seed().await;
        let id = {
            let mut tx = db.begin().await.unwrap();
            tx.insert(NewReply::new(board.id, None, user.id, "draft".into()))
                .await
                .unwrap()
                .id
        };
        assert!(ReplyStore::find_by_id(&db, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_enforces_content_and_references() {
        let (db, board, user) = seed().await;
        let mut tx = db.begin().await.unwrap();

        let blank = tx.insert(NewReply::new(board.id, None, user.id, " ".into())).await;
        assert!(matches!(blank, Err(DomainError::ConstraintViolation(_))));

        let orphan = tx
            .insert(NewReply::new(board.id, Some(Uuid::now_v7()), user.id, "x".into()))
            .await;
        assert!(matches!(orphan, Err(DomainError::ConstraintViolation(_))));

        let no_board = tx.insert(NewReply::new(Uuid::now_v7(), None, user.id, "x".into())).await;
        assert!(matches!(no_board, Err(DomainError::ConstraintViolation(_))));
    }

    #[tokio::test]
    async fn tree_rows_follow_path_order_and_respect_depth() {
        let (db, board, user) = seed().await;
        let r1 = insert(&db, &board, &user, None).await;
        let r2 = insert(&db, &board, &user, None).await;
        let c1 = insert(&db, &board, &user, Some(r1.id)).await;
        let g1 = insert(&db, &board, &user, Some(c1.id)).await;
        let c2 = insert(&db, &board, &user, Some(r1.id)).await;

        let rows = db.find_tree_rows(board.id, 5).await.unwrap();
        let order: Vec<_> = rows.iter().map(|r| (r.id, r.depth)).collect();
        assert_eq!(
            order,
            vec![(r1.id, 0), (c1.id, 1), (g1.id, 2), (c2.id, 1), (r2.id, 0)]
        );
        assert!(rows.iter().all(|r| r.author_name == "alice"));

        let shallow = db.find_tree_rows(board.id, 1).await.unwrap();
        assert_eq!(shallow.len(), 4);
        assert!(shallow.iter().all(|r| r.id != g1.id));
    }

    #[tokio::test]
    async fn count_skips_tombstones() {
        let (db, board, user) = seed().await;
        let root = insert(&db, &board, &user, None).await;
        insert(&db, &board, &user, Some(root.id)).await;

        let mut tx = db.begin().await.unwrap();
        tx.mark_deleted(root.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(db.count_for_board(board.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn injected_faults_fail_then_clear() {
        let (db, board, _) = seed().await;
        db.fail_next_increments(2);

        assert!(db.increment_view_count(board.id).await.unwrap_err().is_transient());
        assert!(db.increment_view_count(board.id).await.is_err());
        assert_eq!(db.increment_view_count(board.id).await.unwrap(), 1);
        assert_eq!(db.increment_view_count(Uuid::now_v7()).await.unwrap(), 0);
        assert_eq!(db.view_count(board.id), Some(1));
        assert_eq!(db.increment_calls(), 4);
    }
}
