//! Board and user lookups for Postgres.
//!
//! The view counter is only ever changed by a single `UPDATE ... + 1`
//! statement; it is never read, bumped in memory and written back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{Board, BoardRepository, DomainResult, User, UserRepository};
use sqlx::PgPool;
use uuid::Uuid;

use super::map_sqlx_error;

#[derive(sqlx::FromRow)]
struct BoardRecord {
    id: Uuid,
    title: String,
    author_id: Uuid,
    view_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BoardRecord> for Board {
    fn from(r: BoardRecord) -> Self {
        Board {
            id: r.id,
            title: r.title,
            author_id: r.author_id,
            view_count: r.view_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    created_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(r: UserRecord) -> Self {
        User {
            id: r.id,
            username: r.username,
            created_at: r.created_at,
        }
    }
}

pub struct PgBoardRepository {
    pool: PgPool,
}

impl PgBoardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a board. Board management lives elsewhere; this exists for seeding.
    pub async fn create(&self, title: &str, author_id: Uuid) -> DomainResult<Board> {
        let record = sqlx::query_as::<_, BoardRecord>(
            "INSERT INTO boards (id, title, author_id) VALUES ($1, $2, $3) \
             RETURNING id, title, author_id, view_count, created_at, updated_at",
        )
        .bind(Uuid::now_v7())
        .bind(title)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(record.into())
    }
}

#[async_trait]
impl BoardRepository for PgBoardRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Board>> {
        let record = sqlx::query_as::<_, BoardRecord>(
            "SELECT id, title, author_id, view_count, created_at, updated_at \
             FROM boards WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(record.map(Board::from))
    }

    async fn increment_view_count(&self, id: Uuid) -> DomainResult<u64> {
        let result = sqlx::query("UPDATE boards SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the existing user when the name is taken.
    pub async fn upsert(&self, username: &str) -> DomainResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, username) VALUES ($1, $2) \
             ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username \
             RETURNING id, username, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(record.into())
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(record.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(record.map(User::from))
    }
}
