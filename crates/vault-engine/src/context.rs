//! Engine context: single point of truth for store lifetimes.
//!
//! The context is an explicitly constructed object owned by the caller
//! (the worker binary or an embedding host) — there are no module-level
//! singletons. Stores are lazily constructed and memoized: the
//! relational pool and repos on `init_database`/`init_repos`, the
//! in-memory text index and graph on first access. Repo getters called
//! before initialization fail with
//! [`EngineError::NotInitialized`](vault_engine_core::error::EngineError).

use std::path::{Path, PathBuf};

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::debug;

use vault_engine_core::error::EngineError;
use vault_engine_core::graph::GraphIndex;
use vault_engine_core::models::DEFAULT_EMBEDDING_DIMS;
use vault_engine_core::text_index::TextIndex;

use crate::db;
use crate::migrate;
use crate::repos::{DocMetaRepo, IndexStateRepo, RecentOpenRepo};

const DB_FILE: &str = "vault-index.sqlite";

/// Owns the three stores plus derived engine state for the lifetime of
/// one engine instance.
pub struct EngineContext {
    data_dir: PathBuf,
    vault_id: Option<String>,
    embedding_dims: usize,
    pool: Option<SqlitePool>,
    doc_meta: Option<DocMetaRepo>,
    recent_open: Option<RecentOpenRepo>,
    index_state: Option<IndexStateRepo>,
    text_index: Option<TextIndex>,
    graph: Option<GraphIndex>,
    /// Set true on the first non-empty index request of this process.
    ready: bool,
}

impl EngineContext {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            vault_id: None,
            embedding_dims: DEFAULT_EMBEDDING_DIMS,
            pool: None,
            doc_meta: None,
            recent_open: None,
            index_state: None,
            text_index: None,
            graph: None,
            ready: false,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn vault_id(&self) -> Option<&str> {
        self.vault_id.as_deref()
    }

    /// Re-binding the vault id is allowed on repeated `init`.
    pub fn set_vault_id(&mut self, id: String) {
        self.vault_id = Some(id);
    }

    pub fn embedding_dims(&self) -> usize {
        self.embedding_dims
    }

    /// Configure the embedding dimension. Takes effect for indexes
    /// constructed afterwards; an already-built index keeps its own.
    pub fn set_embedding_dims(&mut self, dims: usize) {
        self.embedding_dims = dims;
    }

    /// Open (or restore) the relational database and run migrations.
    ///
    /// Memoized: a second call on a live context is a no-op, so `init`
    /// is idempotent per engine instance.
    pub async fn init_database(&mut self, snapshot: Option<&[u8]>) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }
        if let Some(bytes) = snapshot {
            db::import_snapshot(&self.db_path(), bytes)?;
            debug!(bytes = bytes.len(), "restored relational snapshot");
        }
        let pool = db::connect(&self.db_path()).await?;
        migrate::run_migrations(&pool).await?;
        self.pool = Some(pool);
        Ok(())
    }

    /// Construct and memoize the three repos. Requires `init_database`.
    pub fn init_repos(&mut self) -> Result<(), EngineError> {
        let pool = self
            .pool
            .as_ref()
            .ok_or(EngineError::NotInitialized("database pool"))?;
        if self.doc_meta.is_none() {
            self.doc_meta = Some(DocMetaRepo::new(pool.clone()));
        }
        if self.recent_open.is_none() {
            self.recent_open = Some(RecentOpenRepo::new(pool.clone()));
        }
        if self.index_state.is_none() {
            self.index_state = Some(IndexStateRepo::new(pool.clone()));
        }
        Ok(())
    }

    pub fn doc_meta(&self) -> Result<&DocMetaRepo, EngineError> {
        self.doc_meta
            .as_ref()
            .ok_or(EngineError::NotInitialized("doc metadata repo"))
    }

    pub fn recent_open(&self) -> Result<&RecentOpenRepo, EngineError> {
        self.recent_open
            .as_ref()
            .ok_or(EngineError::NotInitialized("recent-open repo"))
    }

    pub fn index_state(&self) -> Result<&IndexStateRepo, EngineError> {
        self.index_state
            .as_ref()
            .ok_or(EngineError::NotInitialized("index-state repo"))
    }

    /// The in-memory text/vector index, constructed empty on first use.
    pub fn text_index(&mut self) -> &mut TextIndex {
        let dims = self.embedding_dims;
        self.text_index.get_or_insert_with(|| TextIndex::new(dims))
    }

    /// The in-memory graph index, constructed empty on first use.
    pub fn graph(&mut self) -> &mut GraphIndex {
        self.graph.get_or_insert_with(GraphIndex::new)
    }

    /// Replace the text index from a restored snapshot.
    pub fn restore_text_index(&mut self, snapshot: &str) -> Result<(), EngineError> {
        let index = TextIndex::from_snapshot(snapshot)?;
        self.embedding_dims = index.dims();
        self.text_index = Some(index);
        Ok(())
    }

    /// Replace the graph index from a restored snapshot.
    pub fn restore_graph(&mut self, snapshot: &str) -> Result<(), EngineError> {
        self.graph = Some(GraphIndex::from_snapshot(snapshot)?);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn mark_ready(&mut self) {
        self.ready = true;
    }

    /// Clear relational tables and drop the in-memory index/graph,
    /// leaving the context ready for re-initialization.
    ///
    /// Does not produce a new empty snapshot; exporting the emptied
    /// state is the caller's responsibility (reset + export are a pair).
    pub async fn reset_index(&mut self, clear_recent: bool) -> Result<()> {
        self.doc_meta()?.clear().await?;
        self.index_state()?.clear().await?;
        if clear_recent {
            self.recent_open()?.clear().await?;
        }
        self.text_index = None;
        self.graph = None;
        self.ready = false;
        debug!(clear_recent, "index reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_getters_before_init_fail_with_not_initialized() {
        let ctx = EngineContext::new("/tmp/never-created");
        assert!(matches!(
            ctx.doc_meta(),
            Err(EngineError::NotInitialized(_))
        ));
        assert!(matches!(
            ctx.recent_open(),
            Err(EngineError::NotInitialized(_))
        ));
        assert!(matches!(
            ctx.index_state(),
            Err(EngineError::NotInitialized(_))
        ));
    }

    #[test]
    fn init_repos_before_database_fails() {
        let mut ctx = EngineContext::new("/tmp/never-created");
        assert!(matches!(
            ctx.init_repos(),
            Err(EngineError::NotInitialized("database pool"))
        ));
    }

    #[test]
    fn in_memory_indexes_are_lazy_and_memoized() {
        let mut ctx = EngineContext::new("/tmp/never-created");
        ctx.set_embedding_dims(4);
        assert_eq!(ctx.text_index().dims(), 4);
        // Second access returns the same instance, not a rebuild.
        ctx.set_embedding_dims(8);
        assert_eq!(ctx.text_index().dims(), 4);
        assert_eq!(ctx.graph().node_count(), 0);
    }
}
