//! Hooks that run immediately around the handler.
//!
//! An [`ActionHook`] has two extension points:
//!
//! - [`before`](ActionHook::before) sees the request first. Returning
//!   `Some(response)` short-circuits: the handler and `after` are skipped and
//!   that response goes back up the chain.
//! - [`after`](ActionHook::after) runs once the handler has produced a
//!   response. It observes; it cannot change what is sent. When a stage
//!   further in answers instead of the handler, `after` is skipped.
//!
//! Wrap a hook in [`ActionHookStage`] to place it in the pipeline. A
//! globally registered hook wraps a route-scoped one, so for hooks `A`
//! (global) and `B` (route) the calls are `A.before, B.before, handler,
//! B.after, A.after`.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::info;

use crate::error::Error;
use crate::events::{EventSink, PipelineEvent, SharedSink, TracingSink};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Before/after extension points around a handler call.
#[async_trait]
pub trait ActionHook: Send + Sync + 'static {
    /// Return `Some` to answer the request without running the handler.
    #[allow(unused_variables)]
    async fn before(&self, req: &Request) -> Option<Response> {
        None
    }

    /// Runs only when the handler ran and returned a response.
    #[allow(unused_variables)]
    async fn after(&self, req: &Request, res: &Response) {}
}

/// Adapts an [`ActionHook`] into a pipeline stage.
pub struct ActionHookStage<H> {
    hook: H,
    sink: SharedSink,
}

impl<H: ActionHook> ActionHookStage<H> {
    pub fn new(hook: H) -> Self {
        Self { hook, sink: TracingSink::shared() }
    }

    pub fn with_sink(mut self, sink: impl EventSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }
}

#[async_trait]
impl<H: ActionHook> Middleware for ActionHookStage<H> {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
        if let Some(res) = self.hook.before(&req).await {
            return Ok(res);
        }

        let (outcome, handler_ran) = next.run_tracked(req.clone()).await;
        let res = outcome?;

        if handler_ran {
            self.hook.after(&req, &res).await;
            self.sink.emit(PipelineEvent::ActionExecuted { route: req.path().to_owned() });
        }
        Ok(res)
    }
}

// ── Built-in hooks ────────────────────────────────────────────────────────────

/// Logs every action with its arguments on the way in and its status on the
/// way out.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogActivity;

#[async_trait]
impl ActionHook for LogActivity {
    async fn before(&self, req: &Request) -> Option<Response> {
        info!(
            method = %req.method(),
            route = req.path(),
            arguments = %req.args(),
            "executing action",
        );
        None
    }

    async fn after(&self, req: &Request, res: &Response) {
        info!(
            method = %req.method(),
            route = req.path(),
            status = res.status_code().as_u16(),
            "action executed",
        );
    }
}

/// Writes a timestamped audit line after a sensitive action completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSensitiveAction;

#[async_trait]
impl ActionHook for LogSensitiveAction {
    async fn after(&self, req: &Request, _res: &Response) {
        info!(
            target: "tollgate::audit",
            at = %humantime::format_rfc3339_millis(SystemTime::now()),
            method = %req.method(),
            route = req.path(),
            "sensitive action executed",
        );
    }
}

/// A `before` hook driven by a caller-supplied policy.
///
/// ```rust
/// use tollgate::middleware::{ActionHookStage, Guard};
/// use tollgate::{Request, Response, StatusCode};
///
/// let maintenance = ActionHookStage::new(Guard::new(|req: &Request| {
///     (req.header("x-maintenance") == Some("on"))
///         .then(|| Response::status(StatusCode::SERVICE_UNAVAILABLE))
/// }));
/// ```
pub struct Guard<F> {
    policy: F,
}

impl<F> Guard<F>
where
    F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
{
    pub fn new(policy: F) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl<F> ActionHook for Guard<F>
where
    F: Fn(&Request) -> Option<Response> + Send + Sync + 'static,
{
    async fn before(&self, req: &Request) -> Option<Response> {
        (self.policy)(req)
    }
}
