//! Incremental update queue (host-side).
//!
//! Debounces external create/modify/delete/rename notifications into
//! batched upsert/delete requests. Upserts and deletes accumulate in
//! separate pending sets; a delete cancels any pending upsert for the
//! same path; a rename is a delete-of-old plus upsert-of-new. After a
//! quiet period with no new notifications the queue flushes: deletes
//! first, then upserts, re-reading current content for each upserted
//! path immediately before sending so stale content is never indexed.
//! Flush failures are logged and not retried; the next notification
//! re-arms the queue.

use std::collections::BTreeSet;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, warn};

use vault_engine_core::models::ChangeEvent;

use crate::reconcile::{DocumentSource, IndexService};

/// Pending change sets. Pure merge logic, separated from timing so the
/// debounce rules are testable without a runtime.
#[derive(Debug, Default)]
pub struct PendingChanges {
    upserts: BTreeSet<String>,
    deletes: BTreeSet<String>,
}

impl PendingChanges {
    /// Merge one change event, exhaustively matched.
    pub fn apply(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Created { path } | ChangeEvent::Modified { path } => {
                self.deletes.remove(&path);
                self.upserts.insert(path);
            }
            ChangeEvent::Deleted { path } => {
                self.upserts.remove(&path);
                self.deletes.insert(path);
            }
            ChangeEvent::Renamed { from, to } => {
                self.upserts.remove(&from);
                self.deletes.insert(from);
                self.deletes.remove(&to);
                self.upserts.insert(to);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Drain into `(deletes, upserts)` — flush order.
    pub fn take(&mut self) -> (Vec<String>, Vec<String>) {
        let deletes = std::mem::take(&mut self.deletes).into_iter().collect();
        let upserts = std::mem::take(&mut self.upserts).into_iter().collect();
        (deletes, upserts)
    }

    pub fn pending_upserts(&self) -> impl Iterator<Item = &str> {
        self.upserts.iter().map(|s| s.as_str())
    }

    pub fn pending_deletes(&self) -> impl Iterator<Item = &str> {
        self.deletes.iter().map(|s| s.as_str())
    }
}

/// Counts from one flush.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub deleted: usize,
    pub indexed: usize,
    /// Upsert paths that did not yield a document at flush time:
    /// deleted between notification and flush, or unreadable (logged
    /// and skipped, never aborting the batch).
    pub missing: usize,
}

/// Debounced update queue.
pub struct UpdateQueue {
    pending: PendingChanges,
    quiet_period: Duration,
    deadline: Option<Instant>,
}

impl UpdateQueue {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            pending: PendingChanges::default(),
            quiet_period,
            deadline: None,
        }
    }

    /// Record a change and (re)arm the quiet-period deadline.
    pub fn notify(&mut self, event: ChangeEvent) {
        self.pending.apply(event);
        self.deadline = Some(Instant::now() + self.quiet_period);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Send pending deletes then upserts to the engine. Content for
    /// each upsert is re-read from the source at flush time; a path
    /// that fails to read is logged and skipped, not retried.
    pub async fn flush<S, E>(&mut self, source: &S, engine: &mut E) -> Result<FlushSummary>
    where
        S: DocumentSource,
        E: IndexService,
    {
        self.deadline = None;
        if self.pending.is_empty() {
            return Ok(FlushSummary::default());
        }

        let (deletes, upserts) = self.pending.take();
        let mut summary = FlushSummary::default();

        if !deletes.is_empty() {
            summary.deleted = engine.delete_documents(deletes).await?;
        }

        let mut docs = Vec::with_capacity(upserts.len());
        for path in &upserts {
            match source.load(path).await {
                Ok(Some(doc)) => docs.push(doc),
                Ok(None) => summary.missing += 1,
                Err(err) => {
                    warn!(%path, %err, "failed to load document; skipping");
                    summary.missing += 1;
                }
            }
        }
        if !docs.is_empty() {
            summary.indexed = engine.index_documents(docs).await?;
        }

        debug!(
            deleted = summary.deleted,
            indexed = summary.indexed,
            missing = summary.missing,
            "update queue flushed"
        );
        Ok(summary)
    }

    /// Drive the queue from a channel of change events.
    ///
    /// Flushes after the quiet period elapses with no new events, and
    /// once more when the channel closes. Flush failures are logged and
    /// not retried; the next event re-arms the queue.
    pub async fn run<S, E>(
        mut self,
        mut events: mpsc::Receiver<ChangeEvent>,
        source: &S,
        engine: &mut E,
    ) where
        S: DocumentSource,
        E: IndexService,
    {
        loop {
            let deadline = self.deadline.unwrap_or_else(Instant::now);
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => self.notify(event),
                    None => {
                        if let Err(err) = self.flush(source, engine).await {
                            warn!(%err, "final update flush failed");
                        }
                        return;
                    }
                },
                _ = sleep_until(deadline), if self.deadline.is_some() => {
                    if let Err(err) = self.flush(source, engine).await {
                        warn!(%err, "update flush failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(path: &str) -> ChangeEvent {
        ChangeEvent::Created {
            path: path.to_string(),
        }
    }

    fn deleted(path: &str) -> ChangeEvent {
        ChangeEvent::Deleted {
            path: path.to_string(),
        }
    }

    #[test]
    fn delete_cancels_pending_upsert() {
        let mut pending = PendingChanges::default();
        pending.apply(created("a.md"));
        pending.apply(deleted("a.md"));

        let (deletes, upserts) = pending.take();
        assert_eq!(deletes, vec!["a.md"]);
        assert!(upserts.is_empty());
    }

    #[test]
    fn create_after_delete_reinstates_upsert() {
        let mut pending = PendingChanges::default();
        pending.apply(deleted("a.md"));
        pending.apply(created("a.md"));

        let (deletes, upserts) = pending.take();
        assert!(deletes.is_empty());
        assert_eq!(upserts, vec!["a.md"]);
    }

    #[test]
    fn rename_is_delete_old_plus_upsert_new() {
        let mut pending = PendingChanges::default();
        pending.apply(created("old.md"));
        pending.apply(ChangeEvent::Renamed {
            from: "old.md".to_string(),
            to: "new.md".to_string(),
        });

        let (deletes, upserts) = pending.take();
        assert_eq!(deletes, vec!["old.md"]);
        assert_eq!(upserts, vec!["new.md"]);
    }

    #[test]
    fn repeated_modifications_collapse() {
        let mut pending = PendingChanges::default();
        pending.apply(created("a.md"));
        pending.apply(ChangeEvent::Modified {
            path: "a.md".to_string(),
        });
        pending.apply(ChangeEvent::Modified {
            path: "a.md".to_string(),
        });

        let (deletes, upserts) = pending.take();
        assert!(deletes.is_empty());
        assert_eq!(upserts, vec!["a.md"]);
    }

    #[test]
    fn take_drains_the_sets() {
        let mut pending = PendingChanges::default();
        pending.apply(created("a.md"));
        let _ = pending.take();
        assert!(pending.is_empty());
    }

    #[test]
    fn notify_arms_the_deadline() {
        let mut queue = UpdateQueue::new(Duration::from_millis(100));
        assert!(!queue.is_armed());
        queue.notify(created("a.md"));
        assert!(queue.is_armed());
    }
}
