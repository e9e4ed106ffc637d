//! Middleware stages.
//!
//! A stage sits between the server and the handler. It receives the request
//! and a [`Next`] continuation standing for the rest of the chain, and it
//! decides whether the rest of the chain runs at all:
//!
//! ```text
//! RateLimiter → ProfilingStage → ActionHookStage(before) → handler
//!                                ActionHookStage(after)  ←
//!              ProfilingStage(elapsed)                   ←
//! ```
//!
//! - Calling `next.run(req)` runs every later stage and then the handler.
//! - Returning a response without calling `next` short-circuits: nothing
//!   downstream runs. This is a normal outcome, not an error.
//! - Returning `Err` is a fault and propagates to the server unchanged.
//!
//! `Next` is consumed by `run`, so a stage can call the rest of the chain at
//! most once.
//!
//! Built-in stages:
//! - [`rate_limit`]: fixed-window admission control, `429` on reject
//! - [`profile`]: elapsed time of everything downstream
//! - [`action`]: before/after hooks around the handler

pub mod action;
pub mod profile;
pub mod rate_limit;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use http::Method;

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;

pub use action::{ActionHook, ActionHookStage, Guard, LogActivity, LogSensitiveAction};
pub use profile::ProfilingStage;
pub use rate_limit::{Admission, RateLimiter, WindowSnapshot};

/// One unit of the request pipeline.
///
/// ```rust,no_run
/// use tollgate::middleware::{Middleware, Next};
/// use tollgate::{Error, Request, Response};
/// use async_trait::async_trait;
///
/// struct RequestId;
///
/// #[async_trait]
/// impl Middleware for RequestId {
///     async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error> {
///         let res = next.run(req).await?;
///         Ok(res)
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response, Error>;
}

/// Shared handle to a stage.
pub type SharedMiddleware = Arc<dyn Middleware>;

/// The rest of the chain, as seen from one stage.
pub struct Next<'a> {
    stages: &'a [SharedMiddleware],
    endpoint: &'a BoxedHandler,
    reached: &'a AtomicBool,
}

impl<'a> Next<'a> {
    /// `reached` is set once the handler is invoked; one flag per request.
    pub(crate) fn new(
        stages: &'a [SharedMiddleware],
        endpoint: &'a BoxedHandler,
        reached: &'a AtomicBool,
    ) -> Self {
        Self { stages, endpoint, reached }
    }

    /// Runs the remaining stages and then the handler.
    pub async fn run(self, req: Request) -> Result<Response, Error> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage.handle(req, Next::new(rest, self.endpoint, self.reached)).await
            }
            None => {
                self.reached.store(true, Ordering::Release);
                self.endpoint.call(req).await
            }
        }
    }

    /// Like [`run`](Next::run), also reporting whether the handler was
    /// invoked. `false` means some later stage answered on its own.
    pub async fn run_tracked(self, req: Request) -> (Result<Response, Error>, bool) {
        let reached = self.reached;
        let outcome = self.run(req).await;
        (outcome, reached.load(Ordering::Acquire))
    }

    /// Number of stages still ahead, not counting the handler.
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}

/// Where a registered stage applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Every request, including unmatched ones.
    Global,
    /// Only requests matched to one route: this method and pattern
    /// (e.g. `GET /products/{id}`).
    Route { method: Method, pattern: String },
}

impl Scope {
    pub fn route(method: Method, pattern: impl Into<String>) -> Self {
        Self::Route { method, pattern: pattern.into() }
    }

    pub(crate) fn applies_to(&self, route: Option<(&Method, &str)>) -> bool {
        match self {
            Self::Global => true,
            Self::Route { method, pattern } => route == Some((method, pattern.as_str())),
        }
    }
}
