use chrono::{DateTime, Utc};
use tokio::time::Instant;

use propsync_core::Clock;

/// Wall-clock time that advances with the tokio clock, so a paused runtime
/// also pauses debounce and suppression deadlines.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin_utc: DateTime<Utc>,
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin_utc: DateTime<Utc>) -> Self {
        Self {
            origin_utc,
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin_utc + chrono::Duration::from_std(self.origin.elapsed()).unwrap_or_default()
    }
}
