//! Startup index reconciliation (host-side orchestrator).
//!
//! Diffs the external corpus against the relational store's recorded
//! modification times to decide between full and incremental
//! (re)indexing:
//!
//! ```text
//! NoIndex ──▶ FullIndexing ──▶ Ready
//! Ready ──▶ IncrementalIndexing ──▶ Ready   (on detected drift)
//! ```
//!
//! A path missing from the stored map is **new**, a stored path with a
//! different mtime is **modified**, a stored path absent from the scan
//! is **deleted**. New and modified documents are (re)indexed in
//! bounded batches; deleted documents are removed. Documents that fail
//! to load are logged and skipped without aborting the batch.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use vault_engine_core::models::{IndexStatus, IndexableDocument, IndexedPath};

use crate::context::EngineContext;
use crate::handlers::{self, DeleteParams, IndexParams};
use crate::progress::{ProgressEvent, ProgressReporter, Throttle};

/// Reconciliation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexHealth {
    NoIndex,
    FullIndexing,
    IncrementalIndexing,
    Ready,
}

/// The external document store, specified at its interface boundary.
/// Provides the current corpus and loads documents on demand.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Scan the corpus for current `{path, mtime}` pairs.
    async fn scan(&self) -> Result<Vec<IndexedPath>>;

    /// Load a document ready for indexing. `Ok(None)` means the path
    /// disappeared between scan and load; errors are best-effort
    /// skipped by the driver.
    async fn load(&self, path: &str) -> Result<Option<IndexableDocument>>;
}

/// The engine operations the driver needs, abstracted so the driver
/// works against any transport. The in-process implementation for
/// [`EngineContext`] calls the handlers the protocol router dispatches
/// to.
#[async_trait]
pub trait IndexService: Send {
    async fn status(&mut self) -> Result<IndexStatus>;
    async fn indexed_paths(&mut self) -> Result<Vec<IndexedPath>>;
    async fn index_documents(&mut self, docs: Vec<IndexableDocument>) -> Result<usize>;
    async fn delete_documents(&mut self, paths: Vec<String>) -> Result<usize>;

    /// Bytes of persisted index storage, when the engine can tell.
    /// Reported in the terminal progress summary.
    async fn storage_footprint(&mut self) -> Result<Option<u64>> {
        Ok(None)
    }
}

#[async_trait]
impl IndexService for EngineContext {
    async fn status(&mut self) -> Result<IndexStatus> {
        handlers::get_status(self).await
    }

    async fn indexed_paths(&mut self) -> Result<Vec<IndexedPath>> {
        handlers::get_indexed_paths(self).await
    }

    async fn index_documents(&mut self, docs: Vec<IndexableDocument>) -> Result<usize> {
        let result = handlers::index_documents(self, IndexParams { docs }).await?;
        Ok(result.indexed)
    }

    async fn delete_documents(&mut self, paths: Vec<String>) -> Result<usize> {
        let result = handlers::delete_documents(self, DeleteParams { paths }).await?;
        Ok(result.deleted)
    }

    async fn storage_footprint(&mut self) -> Result<Option<u64>> {
        Ok(std::fs::metadata(self.db_path()).ok().map(|m| m.len()))
    }
}

/// Outcome of diffing stored mtimes against a corpus scan.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CorpusDiff {
    pub new: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl CorpusDiff {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Paths needing (re)indexing: new first, then modified.
    pub fn to_index(&self) -> Vec<String> {
        self.new.iter().chain(self.modified.iter()).cloned().collect()
    }
}

/// Classify each corpus path as new/modified/unchanged and each stored
/// path missing from the scan as deleted. Output is sorted for
/// determinism.
pub fn diff_corpus(stored: &HashMap<String, i64>, scan: &[IndexedPath]) -> CorpusDiff {
    let mut diff = CorpusDiff::default();
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for entry in scan {
        seen.insert(&entry.path);
        match stored.get(&entry.path) {
            None => diff.new.push(entry.path.clone()),
            Some(stored_mtime) if *stored_mtime != entry.mtime => {
                diff.modified.push(entry.path.clone())
            }
            Some(_) => {} // unchanged, not re-indexed
        }
    }
    for path in stored.keys() {
        if !seen.contains(path.as_str()) {
            diff.deleted.push(path.clone());
        }
    }

    diff.new.sort();
    diff.modified.sort();
    diff.deleted.sort();
    diff
}

/// Pull-based cursor yielding bounded batches with early termination.
pub struct BatchCursor<T> {
    items: std::vec::IntoIter<T>,
    batch_size: usize,
}

impl<T> BatchCursor<T> {
    pub fn new(items: Vec<T>, batch_size: usize) -> Self {
        Self {
            items: items.into_iter(),
            batch_size: batch_size.max(1),
        }
    }
}

impl<T> Iterator for BatchCursor<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        let batch: Vec<T> = self.items.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// Reconciliation policy knobs.
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    /// Run full indexing automatically when no index exists; when
    /// false, the driver stays in `NoIndex` and the host prompts the
    /// user.
    pub auto_full_index: bool,
    pub batch_size: usize,
    /// Minimum interval between progress updates.
    pub progress_interval: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            auto_full_index: true,
            batch_size: 50,
            progress_interval: Duration::from_millis(500),
        }
    }
}

/// Summary of one reconciliation run.
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub indexed: usize,
    pub deleted: usize,
    /// Documents that failed to load and were skipped.
    pub skipped: usize,
}

/// Run the startup reconciliation flow against an engine.
///
/// Returns the resulting [`IndexHealth`] along with counts. Not
/// preemptible; a long corpus is simply worked through batch by batch.
pub async fn run_startup<S, E>(
    source: &S,
    engine: &mut E,
    policy: &ReconcilePolicy,
    reporter: &dyn ProgressReporter,
) -> Result<(IndexHealth, ReconcileSummary)>
where
    S: DocumentSource,
    E: IndexService,
{
    let status = engine.status().await?;

    if status.index_built_at.is_none() && !status.is_ready {
        if !policy.auto_full_index {
            info!("no index present; waiting for explicit build");
            return Ok((IndexHealth::NoIndex, ReconcileSummary::default()));
        }
        info!("no index present; running full indexing");
        let scan = source.scan().await?;
        let paths: Vec<String> = scan.into_iter().map(|p| p.path).collect();
        let summary = index_in_batches(source, engine, paths, policy, reporter).await?;
        return Ok((IndexHealth::Ready, summary));
    }

    let stored: HashMap<String, i64> = engine
        .indexed_paths()
        .await?
        .into_iter()
        .map(|p| (p.path, p.mtime))
        .collect();
    let scan = source.scan().await?;
    let diff = diff_corpus(&stored, &scan);

    if diff.is_empty() {
        info!("index up to date");
        return Ok((IndexHealth::Ready, ReconcileSummary::default()));
    }

    info!(
        new = diff.new.len(),
        modified = diff.modified.len(),
        deleted = diff.deleted.len(),
        "corpus drift detected; running incremental indexing"
    );

    let mut summary = ReconcileSummary::default();
    if !diff.deleted.is_empty() {
        summary.deleted = engine.delete_documents(diff.deleted.clone()).await?;
    }
    let indexed = index_in_batches(source, engine, diff.to_index(), policy, reporter).await?;
    summary.indexed = indexed.indexed;
    summary.skipped = indexed.skipped;

    Ok((IndexHealth::Ready, summary))
}

/// Index the given paths in bounded batches with throttled progress.
async fn index_in_batches<S, E>(
    source: &S,
    engine: &mut E,
    paths: Vec<String>,
    policy: &ReconcilePolicy,
    reporter: &dyn ProgressReporter,
) -> Result<ReconcileSummary>
where
    S: DocumentSource,
    E: IndexService,
{
    let started = Instant::now();
    let total = paths.len() as u64;
    let mut throttle = Throttle::new(policy.progress_interval);
    let mut summary = ReconcileSummary::default();
    let mut done = 0u64;

    for batch_paths in BatchCursor::new(paths, policy.batch_size) {
        let mut docs = Vec::with_capacity(batch_paths.len());
        for path in &batch_paths {
            match source.load(path).await {
                Ok(Some(doc)) => docs.push(doc),
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    warn!(%path, %err, "failed to load document; skipping");
                    summary.skipped += 1;
                }
            }
        }

        done += batch_paths.len() as u64;
        summary.indexed += engine.index_documents(docs).await?;

        if throttle.ready() {
            reporter.report(ProgressEvent::Indexing {
                count: done,
                total: Some(total),
            });
        }
    }

    reporter.report(ProgressEvent::Finished {
        total_indexed: summary.indexed as u64,
        duration: started.elapsed(),
        storage_bytes: engine.storage_footprint().await?,
    });
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str, mtime: i64) -> IndexedPath {
        IndexedPath {
            path: p.to_string(),
            mtime,
        }
    }

    #[test]
    fn diff_classifies_new_modified_deleted() {
        let stored: HashMap<String, i64> =
            [("a".to_string(), 100), ("b".to_string(), 200)].into();
        let scan = vec![path("a", 100), path("c", 300)];

        let diff = diff_corpus(&stored, &scan);
        assert_eq!(diff.new, vec!["c"]);
        assert!(diff.modified.is_empty());
        assert_eq!(diff.deleted, vec!["b"]);
    }

    #[test]
    fn diff_detects_mtime_drift() {
        let stored: HashMap<String, i64> = [("a".to_string(), 100)].into();
        let scan = vec![path("a", 150)];

        let diff = diff_corpus(&stored, &scan);
        assert!(diff.new.is_empty());
        assert_eq!(diff.modified, vec!["a"]);
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn unchanged_corpus_yields_empty_diff() {
        let stored: HashMap<String, i64> = [("a".to_string(), 100)].into();
        let diff = diff_corpus(&stored, &[path("a", 100)]);
        assert!(diff.is_empty());
    }

    #[test]
    fn batch_cursor_yields_bounded_batches() {
        let batches: Vec<Vec<i32>> = BatchCursor::new((0..7).collect(), 3).collect();
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
    }

    #[test]
    fn batch_cursor_supports_early_termination() {
        let mut cursor = BatchCursor::new((0..100).collect::<Vec<i32>>(), 10);
        assert_eq!(cursor.next().unwrap().len(), 10);
        drop(cursor); // stop pulling; nothing else is materialized
    }

    #[test]
    fn batch_cursor_empty_input() {
        let mut cursor: BatchCursor<i32> = BatchCursor::new(Vec::new(), 5);
        assert!(cursor.next().is_none());
    }
}
