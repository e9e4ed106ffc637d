//! Test doubles for the clock and the event sink.
//!
//! Compiled in test builds and with the `test-helpers` feature:
//!
//! ```toml
//! [dev-dependencies]
//! tollgate = { version = "*", features = ["test-helpers"] }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::events::{EventSink, PipelineEvent};

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give the
/// other to a stage.
///
/// ```
/// use std::time::{Duration, Instant};
/// use tollgate::clock::Clock;
/// use tollgate::testing::ManualClock;
///
/// let start = Instant::now();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::from_secs(11));
/// assert_eq!(clock.now(), start + Duration::from_secs(11));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn set(&self, instant: Instant) {
        *self.now.lock() = instant;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    pub fn timings(&self) -> Vec<(String, Duration)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::RequestTimed { route, elapsed } => Some((route.clone(), *elapsed)),
                _ => None,
            })
            .collect()
    }

    pub fn rejections(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, PipelineEvent::RateLimitRejected { .. }))
            .count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PipelineEvent) {
        self.events.lock().push(event);
    }
}
