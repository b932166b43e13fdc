//! Cancellable, failure-tolerant batch execution.

use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::lock::ReconcileLock;
use crate::ports::ProgressSink;

pub const DEFAULT_YIELD_EVERY: usize = 25;

/// Summary of one bulk run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    /// Documents the operation succeeded on.
    pub completed: usize,
    pub total: usize,
    pub canceled: bool,
    pub failures: usize,
}

impl BulkReport {
    /// Documents never reached because the run was canceled.
    pub fn skipped(&self) -> usize {
        self.total - self.completed - self.failures
    }
}

#[derive(Debug, Clone)]
pub struct BulkRunner {
    lock: ReconcileLock,
    yield_every: usize,
}

impl BulkRunner {
    pub fn new(lock: ReconcileLock) -> Self {
        Self {
            lock,
            yield_every: DEFAULT_YIELD_EVERY,
        }
    }

    /// Yield the thread after every `n` documents; `0` never yields.
    pub fn with_yield_every(mut self, n: usize) -> Self {
        self.yield_every = n;
        self
    }

    /// Run `op` over `paths` in order while holding the reconciliation lock.
    ///
    /// Fails with [`SyncError::Busy`] only when the lock is already held;
    /// per-document errors are counted in the report instead.
    pub fn run<F>(
        &self,
        label: &str,
        paths: &[PathBuf],
        progress: &mut dyn ProgressSink,
        mut op: F,
    ) -> Result<BulkReport, SyncError>
    where
        F: FnMut(&Path) -> Result<(), SyncError>,
    {
        let _guard = self.lock.try_acquire().ok_or(SyncError::Busy)?;

        let mut report = BulkReport {
            total: paths.len(),
            ..BulkReport::default()
        };
        progress.set_total(report.total);
        progress.set_status(label);
        tracing::info!("{label}: {} document(s)", report.total);

        for (index, path) in paths.iter().enumerate() {
            if progress.cancellation_requested() {
                tracing::info!("{label}: canceled after {index} of {}", report.total);
                report.canceled = true;
                break;
            }
            match op(path) {
                Ok(()) => {
                    report.completed += 1;
                    progress.increment_completed();
                }
                Err(err) => {
                    tracing::warn!("{label}: {} failed: {err}", path.display());
                    report.failures += 1;
                    progress.increment_failures();
                }
            }
            if self.yield_every > 0 && (index + 1) % self.yield_every == 0 {
                std::thread::yield_now();
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSink {
        total: usize,
        completed: usize,
        failures: usize,
        cancel_after: Option<usize>,
    }

    impl ProgressSink for CountingSink {
        fn set_total(&mut self, total: usize) {
            self.total = total;
        }
        fn set_status(&mut self, _status: &str) {}
        fn increment_completed(&mut self) {
            self.completed += 1;
        }
        fn increment_failures(&mut self) {
            self.failures += 1;
        }
        fn cancellation_requested(&self) -> bool {
            self.cancel_after
                .is_some_and(|n| self.completed + self.failures >= n)
        }
    }

    fn paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("doc{i}.md"))).collect()
    }

    #[test]
    fn failures_are_counted_and_do_not_abort() {
        let runner = BulkRunner::new(ReconcileLock::new()).with_yield_every(2);
        let mut sink = CountingSink::default();
        let report = runner
            .run("test", &paths(5), &mut sink, |path| {
                if path == Path::new("doc1.md") || path == Path::new("doc3.md") {
                    Err(SyncError::NotFound {
                        path: path.to_path_buf(),
                    })
                } else {
                    Ok(())
                }
            })
            .expect("run");
        assert_eq!(
            report,
            BulkReport {
                completed: 3,
                total: 5,
                canceled: false,
                failures: 2
            }
        );
        assert_eq!((sink.total, sink.completed, sink.failures), (5, 3, 2));
    }

    #[test]
    fn cancellation_is_checked_between_documents() {
        let runner = BulkRunner::new(ReconcileLock::new());
        let mut sink = CountingSink {
            cancel_after: Some(2),
            ..CountingSink::default()
        };
        let mut seen = Vec::new();
        let report = runner
            .run("test", &paths(5), &mut sink, |path| {
                seen.push(path.to_path_buf());
                Ok(())
            })
            .expect("run");
        assert!(report.canceled);
        assert_eq!(report.completed, 2);
        assert_eq!(report.skipped(), 3);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn lock_is_held_during_the_run_and_released_after() {
        let lock = ReconcileLock::new();
        let runner = BulkRunner::new(lock.clone());
        let mut sink = CountingSink::default();
        runner
            .run("test", &paths(2), &mut sink, |_| {
                assert!(lock.is_held());
                Ok(())
            })
            .expect("run");
        assert!(!lock.is_held());
    }

    #[test]
    fn busy_lock_refuses_the_run() {
        let lock = ReconcileLock::new();
        let _held = lock.try_acquire().expect("acquire");
        let runner = BulkRunner::new(lock.clone());
        let mut sink = CountingSink::default();
        let err = runner
            .run("test", &paths(1), &mut sink, |_| Ok(()))
            .expect_err("busy");
        assert!(matches!(err, SyncError::Busy));
    }
}
