//! SQLite database connection management and snapshot I/O.
//!
//! The relational metadata store lives in a single database file under
//! the engine's data directory. Journal mode is `DELETE` rather than
//! WAL: snapshots are whole-file byte exports, and a WAL sidecar would
//! make the exported bytes incomplete.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use vault_engine_core::error::EngineError;

/// Create a connection pool to the database at `db_path`.
///
/// Creates the file and parent directories if they don't exist.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Delete);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Write a relational snapshot to `db_path` before the pool is opened.
pub fn import_snapshot(db_path: &Path, bytes: &[u8]) -> Result<(), EngineError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| EngineError::Persistence(format!("create data dir: {e}")))?;
    }
    std::fs::write(db_path, bytes)
        .map_err(|e| EngineError::Persistence(format!("restore sqlite snapshot: {e}")))
}

/// Read the database file as portable snapshot bytes.
///
/// With `DELETE` journal mode every committed transaction is fully in
/// the main file, so a plain read captures consistent state.
pub fn export_snapshot(db_path: &Path) -> Result<Vec<u8>, EngineError> {
    std::fs::read(db_path)
        .map_err(|e| EngineError::Persistence(format!("export sqlite snapshot: {e}")))
}
