//! # PgReplyStore
//!
//! Maps the `replies` table to domain replies.
//!
//! # Developer Note
//! The tree read is one recursive CTE. Each row carries the array of ids
//! from its root, and ordering by that array puts every parent before its
//! descendants, which is what the forest assembly relies on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    DomainError, DomainResult, NewReply, Reply, ReplyStore, ReplyTransaction, ReplyTreeRow,
};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::map_sqlx_error;

const REPLY_COLUMNS: &str =
    "id, board_id, parent_id, author_id, content, deleted, created_at, updated_at";

const TREE_QUERY: &str = r#"
WITH RECURSIVE reply_tree AS (
    SELECT r.id, r.parent_id, r.content, r.author_id, r.created_at,
           r.updated_at, r.deleted, 0 AS depth, ARRAY[r.id] AS path
    FROM replies r
    WHERE r.board_id = $1 AND r.parent_id IS NULL

    UNION ALL

    SELECT r.id, r.parent_id, r.content, r.author_id, r.created_at,
           r.updated_at, r.deleted, rt.depth + 1, rt.path || r.id
    FROM replies r
    INNER JOIN reply_tree rt ON r.parent_id = rt.id
    WHERE rt.depth < $2
)
SELECT rt.id, rt.parent_id, rt.content, rt.author_id, u.username AS author_name,
       rt.created_at, rt.updated_at, rt.deleted, rt.depth
FROM reply_tree rt
JOIN users u ON rt.author_id = u.id
ORDER BY rt.path
"#;

#[derive(sqlx::FromRow)]
struct ReplyRecord {
    id: Uuid,
    board_id: Uuid,
    parent_id: Option<Uuid>,
    author_id: Uuid,
    content: String,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReplyRecord> for Reply {
    fn from(r: ReplyRecord) -> Self {
        Reply {
            id: r.id,
            board_id: r.board_id,
            parent_id: r.parent_id,
            author_id: r.author_id,
            content: r.content,
            deleted: r.deleted,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TreeRecord {
    id: Uuid,
    parent_id: Option<Uuid>,
    content: String,
    author_id: Uuid,
    author_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted: bool,
    depth: i32,
}

impl TryFrom<TreeRecord> for ReplyTreeRow {
    type Error = DomainError;

    fn try_from(r: TreeRecord) -> Result<Self, Self::Error> {
        let depth = u32::try_from(r.depth)
            .map_err(|_| DomainError::Internal(format!("negative depth for reply {}", r.id)))?;
        Ok(ReplyTreeRow {
            id: r.id,
            parent_id: r.parent_id,
            content: r.content,
            author_id: r.author_id,
            author_name: r.author_name,
            created_at: r.created_at,
            updated_at: r.updated_at,
            deleted: r.deleted,
            depth,
        })
    }
}

pub struct PgReplyStore {
    pool: PgPool,
}

impl PgReplyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReplyStore for PgReplyStore {
    async fn begin(&self) -> DomainResult<Box<dyn ReplyTransaction>> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgReplyTransaction { tx }))
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reply>> {
        let sql = format!("SELECT {REPLY_COLUMNS} FROM replies WHERE id = $1");
        let record = sqlx::query_as::<_, ReplyRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(record.map(Reply::from))
    }

    async fn find_tree_rows(
        &self,
        board_id: Uuid,
        max_depth: u32,
    ) -> DomainResult<Vec<ReplyTreeRow>> {
        let max_depth = i32::try_from(max_depth).unwrap_or(i32::MAX);
        sqlx::query_as::<_, TreeRecord>(TREE_QUERY)
            .bind(board_id)
            .bind(max_depth)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(ReplyTreeRow::try_from)
            .collect()
    }

    async fn count_for_board(&self, board_id: Uuid) -> DomainResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM replies WHERE board_id = $1 AND deleted = false",
        )
        .bind(board_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(count.max(0) as u64)
    }
}

/// Wraps one sqlx transaction; dropping it rolls back.
pub struct PgReplyTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ReplyTransaction for PgReplyTransaction {
    async fn find_by_id(&mut self, id: Uuid) -> DomainResult<Option<Reply>> {
        let sql = format!("SELECT {REPLY_COLUMNS} FROM replies WHERE id = $1");
        let record = sqlx::query_as::<_, ReplyRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(record.map(Reply::from))
    }

    async fn find_direct_children(&mut self, parent_id: Uuid) -> DomainResult<Vec<Reply>> {
        let sql = format!("SELECT {REPLY_COLUMNS} FROM replies WHERE parent_id = $1 ORDER BY id");
        let records = sqlx::query_as::<_, ReplyRecord>(&sql)
            .bind(parent_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(records.into_iter().map(Reply::from).collect())
    }

    async fn insert(&mut self, reply: NewReply) -> DomainResult<Reply> {
        let sql = format!(
            "INSERT INTO replies (id, board_id, parent_id, author_id, content) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {REPLY_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ReplyRecord>(&sql)
            .bind(reply.id)
            .bind(reply.board_id)
            .bind(reply.parent_id)
            .bind(reply.author_id)
            .bind(reply.content)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(record.into())
    }

    async fn update_content(&mut self, id: Uuid, content: &str) -> DomainResult<Reply> {
        let sql = format!(
            "UPDATE replies SET content = $2, updated_at = now() \
             WHERE id = $1 RETURNING {REPLY_COLUMNS}"
        );
        sqlx::query_as::<_, ReplyRecord>(&sql)
            .bind(id)
            .bind(content)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?
            .map(Reply::from)
            .ok_or_else(|| DomainError::not_found("reply", id))
    }

    async fn mark_deleted(&mut self, id: Uuid) -> DomainResult<Reply> {
        let sql = format!(
            "UPDATE replies SET deleted = true, updated_at = now() \
             WHERE id = $1 RETURNING {REPLY_COLUMNS}"
        );
        sqlx::query_as::<_, ReplyRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?
            .map(Reply::from)
            .ok_or_else(|| DomainError::not_found("reply", id))
    }

    async fn remove(&mut self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM replies WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("reply", id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}
