//! Request latency profiling.

use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::{Clock, SharedClock, SystemClock};
use crate::error::Error;
use crate::events::{EventSink, PipelineEvent, SharedSink, TracingSink};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Measures how long the rest of the chain takes.
///
/// Emits one [`PipelineEvent::RequestTimed`] per request, whether the rest of
/// the chain returned a response or a fault. The outcome is handed back
/// untouched.
pub struct ProfilingStage {
    clock: SharedClock,
    sink: SharedSink,
}

impl ProfilingStage {
    pub fn new() -> Self {
        Self { clock: SystemClock::shared(), sink: TracingSink::shared() }
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_sink(mut self, sink: impl EventSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }
}

impl Default for ProfilingStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for ProfilingStage {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
        let route = req.path().to_owned();
        let start = self.clock.now();

        let outcome = next.run(req).await;

        let elapsed = self.clock.now().saturating_duration_since(start);
        self.sink.emit(PipelineEvent::RequestTimed { route, elapsed });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::pipeline::dispatch;
    use crate::testing::{ManualClock, RecordingSink};
    use http::StatusCode;
    use std::time::Duration;

    #[tokio::test]
    async fn times_success_and_failure_alike() {
        let clock = ManualClock::default();
        let sink = RecordingSink::new();
        let stage: Arc<dyn Middleware> = Arc::new(
            ProfilingStage::new().with_clock(clock.clone()).with_sink(sink.clone()),
        );
        let stages = [stage];

        let slow = {
            let clock = clock.clone();
            move |_req: Request| {
                let clock = clock.clone();
                async move {
                    clock.advance(Duration::from_millis(40));
                    StatusCode::ACCEPTED
                }
            }
        }
        .into_boxed_handler();

        let broken = {
            let clock = clock.clone();
            move |_req: Request| {
                let clock = clock.clone();
                async move {
                    clock.advance(Duration::from_millis(7));
                    Err::<Response, _>("upstream timed out")
                }
            }
        }
        .into_boxed_handler();

        let req = Request::builder().path("/products").build();
        let res = dispatch(req.clone(), &stages, &slow).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);

        let err = dispatch(req, &stages, &broken).await.unwrap_err();
        assert!(matches!(err, Error::Handler(_)));

        assert_eq!(
            sink.timings(),
            vec![
                ("/products".to_owned(), Duration::from_millis(40)),
                ("/products".to_owned(), Duration::from_millis(7)),
            ]
        );
    }

    #[tokio::test]
    async fn clock_going_backwards_reports_zero() {
        let clock = ManualClock::default();
        let sink = RecordingSink::new();
        let stage: Arc<dyn Middleware> = Arc::new(
            ProfilingStage::new().with_clock(clock.clone()).with_sink(sink.clone()),
        );
        let stages = [stage];
        let start = clock.now();
        clock.advance(Duration::from_secs(1));

        let rewind = {
            let clock = clock.clone();
            move |_req: Request| {
                let clock = clock.clone();
                async move {
                    clock.set(start);
                    "ok"
                }
            }
        }
        .into_boxed_handler();

        dispatch(Request::builder().build(), &stages, &rewind).await.unwrap();
        assert_eq!(sink.timings()[0].1, Duration::ZERO);
    }
}
