//! Repositories over the relational metadata store.
//!
//! Each repo wraps the shared [`SqlitePool`] and translates its
//! operations into SQL against one table: `doc_meta` (per-document
//! metadata), `recent_open` (recently-opened documents), and
//! `index_state` (scalar key-value index state).

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use vault_engine_core::models::{DocumentKind, IndexableDocument, IndexedPath, RecentDoc};

/// Key for the first-successful-indexing timestamp. Written once.
pub const KEY_INDEX_BUILT_AT: &str = "index_built_at";
/// Key for the cumulative indexed-document counter. Monotonic.
pub const KEY_INDEXED_DOCS: &str = "indexed_docs";

/// One row of `doc_meta`.
#[derive(Debug, Clone)]
pub struct DocMetaRecord {
    pub id: String,
    pub source_file_path: String,
    pub cache_file_path: Option<String>,
    pub kind: DocumentKind,
    pub mtime: i64,
    pub ctime: i64,
    pub content_hash: String,
    pub last_processed_at: i64,
}

/// Per-document metadata repository.
#[derive(Clone)]
pub struct DocMetaRepo {
    pool: SqlitePool,
}

impl DocMetaRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update the record for `doc.path`.
    ///
    /// `ctime` is set on first insert and preserved on update; `mtime`,
    /// `content_hash`, and `last_processed_at` always take the new
    /// values (last write wins on equal-mtime collisions).
    pub async fn upsert(&self, doc: &IndexableDocument, content_hash: &str, now: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO doc_meta (id, source_file_path, cache_file_path, kind,
                                  mtime, ctime, content_hash, last_processed_at)
            VALUES (?, ?, NULL, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source_file_path = excluded.source_file_path,
                kind = excluded.kind,
                mtime = excluded.mtime,
                content_hash = excluded.content_hash,
                last_processed_at = excluded.last_processed_at
            "#,
        )
        .bind(&doc.path)
        .bind(&doc.path)
        .bind(doc.kind.as_str())
        .bind(doc.mtime)
        .bind(now)
        .bind(content_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<Option<DocMetaRecord>> {
        let row = sqlx::query(
            "SELECT id, source_file_path, cache_file_path, kind, mtime, ctime, content_hash, last_processed_at FROM doc_meta WHERE id = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DocMetaRecord {
            id: r.get("id"),
            source_file_path: r.get("source_file_path"),
            cache_file_path: r.get("cache_file_path"),
            kind: DocumentKind::parse(r.get::<String, _>("kind").as_str()),
            mtime: r.get("mtime"),
            ctime: r.get("ctime"),
            content_hash: r.get("content_hash"),
            last_processed_at: r.get("last_processed_at"),
        }))
    }

    /// All `{path, mtime}` pairs — the basis for reconciliation diffing.
    pub async fn all_paths(&self) -> Result<Vec<IndexedPath>> {
        let rows = sqlx::query("SELECT id, mtime FROM doc_meta ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| IndexedPath {
                path: r.get("id"),
                mtime: r.get("mtime"),
            })
            .collect())
    }

    /// Delete the record for `path`. Returns whether a row existed.
    pub async fn delete(&self, path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM doc_meta WHERE id = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doc_meta")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM doc_meta").execute(&self.pool).await?;
        Ok(())
    }
}

/// Recently-opened document repository.
#[derive(Clone)]
pub struct RecentOpenRepo {
    pool: SqlitePool,
}

impl RecentOpenRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record (or refresh) an open of `path` at `ts`.
    pub async fn record(&self, path: &str, ts: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recent_open (path, ts) VALUES (?, ?)
            ON CONFLICT(path) DO UPDATE SET ts = excluded.ts
            "#,
        )
        .bind(path)
        .bind(ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The `top_k` most recently opened paths joined with current
    /// metadata, descending by timestamp.
    pub async fn recent(&self, top_k: i64) -> Result<Vec<RecentDoc>> {
        let rows = sqlx::query(
            r#"
            SELECT r.path, r.ts, m.kind, m.mtime
            FROM recent_open r
            LEFT JOIN doc_meta m ON m.id = r.path
            ORDER BY r.ts DESC
            LIMIT ?
            "#,
        )
        .bind(top_k)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| RecentDoc {
                path: r.get("path"),
                ts: r.get("ts"),
                kind: r
                    .get::<Option<String>, _>("kind")
                    .map(|k| DocumentKind::parse(&k)),
                mtime: r.get("mtime"),
            })
            .collect())
    }

    /// Prune the record for a deleted document. Missing path is a no-op.
    pub async fn delete(&self, path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recent_open WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM recent_open")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Scalar key-value index state repository.
#[derive(Clone)]
pub struct IndexStateRepo {
    pool: SqlitePool,
}

impl IndexStateRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_state WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get(key).await?.and_then(|v| v.parse().ok()))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_state (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Write a value only if the key has never been set (build
    /// timestamp semantics).
    pub async fn set_if_unset(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO index_state (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Monotonically increment a counter key by `by`.
    pub async fn increment(&self, key: &str, by: i64) -> Result<i64> {
        // Single-request execution model; no concurrent writers.
        let current = self.get_i64(key).await?.unwrap_or(0);
        let next = current + by;
        self.set(key, &next.to_string()).await?;
        Ok(next)
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM index_state")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
