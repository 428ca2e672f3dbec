//! SQLite-backed record store for users, posts, videos and images.
//!
//! Each repository exposes the plain create / find / update / delete contract
//! the rest of the service relies on. Schema bootstrap is a single embedded SQL
//! file applied by `run_migrations`.

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

pub mod images;
pub mod posts;
pub mod users;
pub mod videos;

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("`{0}` is already taken")]
    Conflict(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new().max_connections(5).connect(url).await
}

/// Apply the embedded schema statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

/// Map a unique-constraint failure to `Conflict(field)`, anything else to `Sqlx`.
pub(crate) fn conflict_or(err: sqlx::Error, field: &str) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::Conflict(field.to_string())
    } else {
        RepositoryError::Sqlx(err)
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");
    run_migrations(&pool).await.expect("apply schema");
    pool
}
