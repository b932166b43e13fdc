//! Trailing-edge debouncing of change events per path.
//!
//! A burst of saves on one path collapses into a single run of the
//! controller, `delay` after the last event of the burst.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use crate::suppression::SuppressionWindow;

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: HashMap<PathBuf, DateTime<Utc>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `path` for `now + delay`. Returns `true` when an already
    /// pending run was pushed back.
    pub fn schedule(&mut self, path: &Path, now: DateTime<Utc>) -> bool {
        self.pending
            .insert(path.to_path_buf(), now + self.delay)
            .is_some()
    }

    pub fn cancel(&mut self, path: &Path) -> bool {
        self.pending.remove(path).is_some()
    }

    pub fn due_at(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.pending.get(path).copied()
    }

    /// Remove and return every path whose deadline has passed, oldest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<PathBuf> {
        let mut due: Vec<(DateTime<Utc>, PathBuf)> = self
            .pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(path, at)| (*at, path.clone()))
            .collect();
        due.sort();
        for (_, path) in &due {
            self.pending.remove(path);
        }
        due.into_iter().map(|(_, path)| path).collect()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.values().min().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Where a path currently sits between the suppression window and the
/// debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPhase {
    Idle,
    Debouncing { due: DateTime<Utc> },
    Suppressed { until: DateTime<Utc>, refs: usize },
}

/// Suppression wins over debouncing: a suppressed path ignores new events.
pub fn phase_of(
    path: &Path,
    debouncer: &Debouncer,
    suppression: &mut SuppressionWindow,
    now: DateTime<Utc>,
) -> PathPhase {
    let refs = suppression.active_refs(path, now);
    if refs > 0 {
        if let Some(until) = suppression.suppressed_until(path) {
            return PathPhase::Suppressed { until, refs };
        }
    }
    match debouncer.due_at(path) {
        Some(due) => PathPhase::Debouncing { due },
        None => PathPhase::Idle,
    }
}
