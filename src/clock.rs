//! Monotonic time source.
//!
//! Stages that measure or compare time read it through [`Clock`] so tests can
//! drive time by hand. See `ManualClock` in [`testing`](crate::testing)
//! (available in test builds and with the `test-helpers` feature).

use std::sync::Arc;
use std::time::Instant;

/// A monotonic time source.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn shared() -> SharedClock {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
