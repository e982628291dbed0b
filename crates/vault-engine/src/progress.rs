//! Indexing progress reporting.
//!
//! The reconciliation driver reports observable progress so users see
//! how much of the corpus has been (re)indexed. Progress goes to
//! **stderr** so stdout stays reserved for protocol envelopes. Updates
//! are throttled by time, not emitted per document, to avoid flooding
//! the host UI.

use std::io::Write;
use std::time::{Duration, Instant};

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Periodic update: `count` documents done out of `total` (when known).
    Indexing { count: u64, total: Option<u64> },
    /// Terminal summary for one reconciliation run.
    Finished {
        total_indexed: u64,
        duration: Duration,
        storage_bytes: Option<u64>,
    },
}

/// Receives progress events. Purely informational.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "indexing 120 / 500 documents".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Indexing { count, total } => match total {
                Some(total) => format!("indexing  {count} / {total} documents\n"),
                None => format!("indexing  {count} documents\n"),
            },
            ProgressEvent::Finished {
                total_indexed,
                duration,
                storage_bytes,
            } => match storage_bytes {
                Some(bytes) => format!(
                    "indexed {total_indexed} documents in {:.1}s ({bytes} bytes on disk)\n",
                    duration.as_secs_f64()
                ),
                None => format!(
                    "indexed {total_indexed} documents in {:.1}s\n",
                    duration.as_secs_f64()
                ),
            },
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Time-based throttle: `ready()` is true at most once per interval.
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether enough time has passed to emit again; arms the throttle
    /// when it returns true. The first call always fires.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_fires_immediately_then_waits() {
        let mut throttle = Throttle::new(Duration::from_secs(3600));
        assert!(throttle.ready());
        assert!(!throttle.ready());
        assert!(!throttle.ready());
    }

    #[test]
    fn zero_interval_always_fires() {
        let mut throttle = Throttle::new(Duration::ZERO);
        assert!(throttle.ready());
        assert!(throttle.ready());
    }
}
