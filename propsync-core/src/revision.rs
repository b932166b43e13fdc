//! Logical revision clock.
//!
//! Markers pair a millisecond wall-clock timestamp with a random 128-bit
//! UUID so two replicas can mint revisions without a shared counter. Time is
//! read through the [`Clock`] trait so tests can drive it deterministically.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::RevisionMarker;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Starts at 2024-01-01T00:00:00Z.
    pub fn at_epoch() -> Self {
        Self::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Mints [`RevisionMarker`]s.
#[derive(Clone)]
pub struct RevisionClock {
    clock: Arc<dyn Clock>,
}

impl RevisionClock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Fresh marker at the current time.
    pub fn create(&self) -> RevisionMarker {
        RevisionMarker {
            updated_at: truncate_to_millis(self.clock.now()),
            revision_id: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Fresh marker strictly greater than `prev`.
    ///
    /// When the clock has not moved past `prev` (same millisecond, or a clock
    /// that went backwards), the timestamp is bumped to `prev + 1ms`.
    pub fn next_after(&self, prev: &RevisionMarker) -> RevisionMarker {
        let mut next = self.create();
        if next <= *prev {
            next.updated_at = prev.updated_at + Duration::milliseconds(1);
        }
        next
    }
}

impl std::fmt::Debug for RevisionClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionClock").finish_non_exhaustive()
    }
}

/// Total order over markers: timestamp first, then revision id.
pub fn compare(a: &RevisionMarker, b: &RevisionMarker) -> Ordering {
    a.updated_at
        .cmp(&b.updated_at)
        .then_with(|| a.revision_id.cmp(&b.revision_id))
}

/// Like [`compare`], with a missing marker ordering below every real one.
pub fn compare_opt(a: Option<&RevisionMarker>, b: Option<&RevisionMarker>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare(a, b),
    }
}

pub fn is_ahead(x: Option<&RevisionMarker>, y: Option<&RevisionMarker>) -> bool {
    compare_opt(x, y) == Ordering::Greater
}

/// Drop sub-millisecond precision. Every marker the engine compares must
/// be truncated, otherwise a stored `.000500Z` stays ahead of the `+1ms`
/// bump in [`RevisionClock::next_after`] for the same millisecond.
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(at.timestamp_millis())
        .single()
        .unwrap_or(at)
}

/// Parse an RFC 3339 revision timestamp, truncated to milliseconds.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CoreError> {
    let parsed = DateTime::parse_from_rfc3339(value.trim()).map_err(|source| {
        CoreError::RevisionTimestamp {
            value: value.to_string(),
            source,
        }
    })?;
    Ok(truncate_to_millis(parsed.with_timezone(&Utc)))
}
