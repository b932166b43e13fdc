//! Cooldown that hides the engine's own writes from itself.
//!
//! Every self-initiated write adds one expiry instant for its path; the path
//! stays suppressed while any of them is in the future. Overlapping writes
//! therefore extend the window instead of cutting it short.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct SuppressionWindow {
    cooldown: Duration,
    entries: HashMap<PathBuf, Vec<DateTime<Utc>>>,
}

impl SuppressionWindow {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            entries: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Mark `path` as about to be written by us.
    pub fn suppress(&mut self, path: &Path, now: DateTime<Utc>) {
        self.entries
            .entry(path.to_path_buf())
            .or_default()
            .push(now + self.cooldown);
    }

    pub fn is_suppressed(&mut self, path: &Path, now: DateTime<Utc>) -> bool {
        self.active_refs(path, now) > 0
    }

    /// Number of unexpired writes for `path`; expired ones are discarded.
    pub fn active_refs(&mut self, path: &Path, now: DateTime<Utc>) -> usize {
        let Some(expiries) = self.entries.get_mut(path) else {
            return 0;
        };
        expiries.retain(|until| *until > now);
        let refs = expiries.len();
        if refs == 0 {
            self.entries.remove(path);
        }
        refs
    }

    /// When the last active write for `path` expires.
    pub fn suppressed_until(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.entries.get(path)?.iter().max().copied()
    }

    /// Paths with at least one recorded write, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every expired write. Paths that are never observed again would
    /// otherwise keep their entries forever.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, expiries| {
            expiries.retain(|until| *until > now);
            !expiries.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn write_is_suppressed_for_the_cooldown_only() {
        let mut window = SuppressionWindow::new(Duration::milliseconds(100));
        let path = Path::new("a.md");
        window.suppress(path, t(0));
        assert!(window.is_suppressed(path, t(99)));
        assert!(!window.is_suppressed(path, t(100)));
    }

    #[test]
    fn overlapping_writes_are_reference_counted() {
        let mut window = SuppressionWindow::new(Duration::milliseconds(100));
        let path = Path::new("a.md");
        window.suppress(path, t(0));
        window.suppress(path, t(60));
        assert_eq!(window.active_refs(path, t(50)), 2);
        assert_eq!(window.active_refs(path, t(120)), 1);
        assert!(window.is_suppressed(path, t(150)));
        assert!(!window.is_suppressed(path, t(160)));
        assert_eq!(window.suppressed_until(path), None);
    }

    #[test]
    fn other_paths_are_unaffected() {
        let mut window = SuppressionWindow::new(Duration::milliseconds(100));
        window.suppress(Path::new("a.md"), t(0));
        assert!(!window.is_suppressed(Path::new("b.md"), t(10)));
    }

    #[test]
    fn prune_drops_expired_entries() {
        let mut window = SuppressionWindow::new(Duration::milliseconds(10));
        window.suppress(Path::new("a.md"), t(0));
        window.suppress(Path::new("b.md"), t(20));
        window.prune(t(15));
        assert_eq!(window.len(), 1);
        assert_eq!(window.suppressed_until(Path::new("a.md")), None);
        assert_eq!(window.suppressed_until(Path::new("b.md")), Some(t(30)));
    }
}
