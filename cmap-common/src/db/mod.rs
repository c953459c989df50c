//! Document store access for CMAP
//!
//! The store is a SQLite database holding one row per document. The nested
//! JSON body in the `data` column is what dot-qualified field paths address
//! into; the `document_segments` table holds child records emitted by
//! segment-emitting consumers.

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize the document store connection pool.
///
/// Creates the parent directory and the database file if missing, and runs
/// idempotent schema creation.
pub async fn init_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to document store: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory pool for tests and throwaway runs.
///
/// Pinned to a single connection: every new connection to `:memory:` would
/// otherwise see its own empty database.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create store tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            language TEXT,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_segments (
            id TEXT PRIMARY KEY,
            parent_id TEXT NOT NULL,
            begin_ms INTEGER NOT NULL,
            end_ms INTEGER NOT NULL,
            segment_type TEXT NOT NULL,
            data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_segments_parent
         ON document_segments(parent_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
