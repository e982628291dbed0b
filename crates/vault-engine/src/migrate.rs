//! Relational schema migrations (idempotent).

use anyhow::Result;
use sqlx::SqlitePool;

/// Create the metadata tables if they don't exist.
///
/// Safe to run on every `init`, including against a restored snapshot.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS doc_meta (
            id TEXT PRIMARY KEY,
            source_file_path TEXT NOT NULL,
            cache_file_path TEXT,
            kind TEXT NOT NULL,
            mtime INTEGER NOT NULL,
            ctime INTEGER NOT NULL,
            content_hash TEXT NOT NULL,
            last_processed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recent_open (
            path TEXT PRIMARY KEY,
            ts INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_recent_open_ts ON recent_open(ts DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_doc_meta_mtime ON doc_meta(mtime)")
        .execute(pool)
        .await?;

    Ok(())
}
