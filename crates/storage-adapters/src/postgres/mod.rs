//! # Postgres adapters
//!
//! sqlx implementations of the reply, board and user ports, plus pool
//! setup, embedded migrations and SQLSTATE to `DomainError` mapping.

mod boards;
mod replies;

use std::time::Duration;

use domains::DomainError;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub use boards::{PgBoardRepository, PgUserRepository};
pub use replies::{PgReplyStore, PgReplyTransaction};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Opens a pool and brings the schema up to date.
pub async fn connect(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, DomainError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .map_err(map_sqlx_error)?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|err| DomainError::Internal(format!("migration failed: {err}")))?;

    tracing::info!(max_connections, "postgres pool ready, migrations applied");
    Ok(pool)
}

/// Classifies a sqlx failure.
///
/// Serialization failures, deadlocks and lock timeouts are transient
/// conflicts; pool exhaustion and I/O are transient outages. Integrity
/// violations become `ConstraintViolation`.
pub fn map_sqlx_error(err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("40001" | "40P01" | "55P03") => DomainError::Conflict(db.message().to_owned()),
            Some("23502" | "23503" | "23505" | "23514" | "22001") => {
                DomainError::ConstraintViolation(db.message().to_owned())
            }
            _ => DomainError::Internal(err.to_string()),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DomainError::Unavailable(err.to_string())
        }
        _ => DomainError::Internal(err.to_string()),
    }
}
