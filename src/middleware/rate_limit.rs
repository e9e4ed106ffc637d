//! Fixed-window rate limiting.
//!
//! One [`RateLimiter`] guards the whole process: it counts admitted requests
//! since the start of the current window and refuses the rest with
//! `429 Too Many Requests` until the window expires.
//!
//! # Fixed, not sliding
//!
//! When a window expires the counter restarts from scratch. A client can
//! therefore get up to `2 × limit` requests through in a short burst that
//! straddles a window boundary: `limit` at the end of one window and `limit`
//! at the start of the next. That burst is the accepted price of a counter
//! that costs one lock and two integers.
//!
//! # Concurrency
//!
//! The clock read, the comparison, the reset and the increment happen inside
//! one critical section, so concurrent [`admit`](RateLimiter::admit) calls
//! behave as if they ran one after the other. Nothing inside the critical
//! section awaits or does I/O.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use http::StatusCode;
use parking_lot::Mutex;

use crate::clock::{Clock, SharedClock, SystemClock};
use crate::config::RateLimitConfig;
use crate::error::Error;
use crate::events::{display_addr, EventSink, PipelineEvent, SharedSink, TracingSink};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

const REJECT_BODY: &str = "Rate limit exceeded. Try again later.";

/// Outcome of an admission check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Reject {
        reason: String,
        /// Time left until the current window expires.
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Copy of the limiter's window state at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub window_start: Instant,
    pub count: u32,
}

struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Process-wide fixed-window counter.
///
/// Share one instance behind an `Arc` between the pipeline and anything that
/// wants to inspect it; never create one per request.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
    clock: SharedClock,
    sink: SharedSink,
}

impl RateLimiter {
    /// Creates a limiter on the system clock.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `limit` or `window` is zero.
    pub fn new(config: RateLimitConfig) -> Result<Self, Error> {
        Self::build(config, SystemClock::shared())
    }

    /// Creates a limiter that reads time from `clock`.
    pub fn with_clock(config: RateLimitConfig, clock: impl Clock) -> Result<Self, Error> {
        Self::build(config, Arc::new(clock))
    }

    fn build(config: RateLimitConfig, clock: SharedClock) -> Result<Self, Error> {
        config.validate()?;
        let window_start = clock.now();
        Ok(Self {
            limit: config.limit,
            window: config.window,
            state: Mutex::new(WindowState { window_start, count: 0 }),
            clock,
            sink: TracingSink::shared(),
        })
    }

    /// Sends rejection events to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: impl EventSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn limit(&self) -> u32 { self.limit }
    pub fn window(&self) -> Duration { self.window }

    pub fn snapshot(&self) -> WindowSnapshot {
        let state = self.state.lock();
        WindowSnapshot { window_start: state.window_start, count: state.count }
    }

    /// Decides whether `req` may proceed, and counts it if so.
    pub fn admit(&self, req: &Request) -> Admission {
        match self.check(req) {
            None => Admission::Allow,
            Some(retry_after) => Admission::Reject {
                reason: format!("rate limit exceeded for {}", display_addr(req.remote_addr())),
                retry_after,
            },
        }
    }

    /// Counts `req` against the window. Returns the wait until the window
    /// expires when it is refused.
    fn check(&self, req: &Request) -> Option<Duration> {
        let retry_after = {
            let mut state = self.state.lock();
            let now = self.clock.now();
            let elapsed = now.saturating_duration_since(state.window_start);

            if elapsed > self.window {
                state.window_start = now;
                state.count = 1;
                None
            } else if state.count < self.limit {
                state.count += 1;
                None
            } else {
                Some(self.window - elapsed)
            }
        }?;

        self.sink.emit(PipelineEvent::RateLimitRejected {
            address: req.remote_addr(),
            route: req.path().to_owned(),
        });
        Some(retry_after)
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for RateLimiter {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
        match self.check(&req) {
            None => next.run(req).await,
            Some(retry_after) => Ok(rejection(retry_after)),
        }
    }
}

fn rejection(retry_after: Duration) -> Response {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header("retry-after", &secs.max(1).to_string())
        .text(REJECT_BODY)
}
