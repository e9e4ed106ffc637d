//! Stage registration and dispatch.
//!
//! A [`Pipeline`] is the ordered list of stages registered at startup, each
//! with a [`Scope`]. For every route the router asks it once for a [`Chain`]:
//! the global stages in registration order, followed by the stages scoped to
//! that route (method and pattern) in registration order. The chain is then reused for every
//! request on the route.
//!
//! ```rust
//! use std::time::Duration;
//! use tollgate::middleware::{ActionHookStage, LogActivity, LogSensitiveAction, ProfilingStage, RateLimiter, Scope};
//! use tollgate::{Method, Pipeline, RateLimitConfig};
//!
//! # fn main() -> Result<(), tollgate::Error> {
//! let limiter = RateLimiter::new(RateLimitConfig::new(5, Duration::from_secs(10)))?;
//!
//! let pipeline = Pipeline::builder()
//!     .stage(Scope::Global, limiter)
//!     .stage(Scope::Global, ProfilingStage::new())
//!     .stage(Scope::Global, ActionHookStage::new(LogActivity))
//!     .stage(Scope::route(Method::GET, "/products/{id}"), ActionHookStage::new(LogSensitiveAction))
//!     .build();
//!
//! assert_eq!(pipeline.chain_for(Some((&Method::GET, "/products/{id}"))).len(), 4);
//! assert_eq!(pipeline.chain_for(Some((&Method::DELETE, "/products/{id}"))).len(), 3);
//! assert_eq!(pipeline.chain_for(None).len(), 3);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use http::Method;

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::middleware::{Middleware, Next, Scope, SharedMiddleware};
use crate::request::Request;
use crate::response::Response;

/// Runs `req` through `stages` (first = outermost) and then `handler`.
///
/// Holds no state of its own. A short-circuiting stage yields `Ok`; a stage
/// or handler fault yields `Err`, unchanged.
pub async fn dispatch(
    req: Request,
    stages: &[SharedMiddleware],
    handler: &BoxedHandler,
) -> Result<Response, Error> {
    let reached = AtomicBool::new(false);
    Next::new(stages, handler, &reached).run(req).await
}

/// Scoped stage registrations, fixed after [`PipelineBuilder::build`].
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<(Scope, SharedMiddleware)>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Resolves the ordered chain for a route (method and pattern); `None`
    /// means the request matched no route and only global stages apply.
    pub fn chain_for(&self, route: Option<(&Method, &str)>) -> Chain {
        let (global, scoped): (Vec<_>, Vec<_>) = self
            .stages
            .iter()
            .filter(|(scope, _)| scope.applies_to(route))
            .partition(|(scope, _)| *scope == Scope::Global);

        let stages = global
            .into_iter()
            .chain(scoped)
            .map(|(_, stage)| Arc::clone(stage))
            .collect();
        Chain { stages }
    }

    /// Every route a route-scoped stage was registered for.
    pub(crate) fn route_scopes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.stages.iter().filter_map(|(scope, _)| match scope {
            Scope::Route { method, pattern } => Some((method, pattern.as_str())),
            Scope::Global => None,
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stages.iter().map(|(scope, _)| scope)).finish()
    }
}

/// Builder for [`Pipeline`]. Registration order is execution order within a
/// scope.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<(Scope, SharedMiddleware)>,
}

impl PipelineBuilder {
    pub fn stage(self, scope: Scope, stage: impl Middleware) -> Self {
        self.shared_stage(scope, Arc::new(stage))
    }

    /// Registers a stage that is also held elsewhere, e.g. a limiter whose
    /// window the application wants to inspect.
    pub fn shared_stage(mut self, scope: Scope, stage: SharedMiddleware) -> Self {
        self.stages.push((scope, stage));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline { stages: self.stages }
    }
}

/// The resolved, ordered stages for one route.
#[derive(Clone, Default)]
pub struct Chain {
    stages: Arc<[SharedMiddleware]>,
}

impl Chain {
    pub async fn dispatch(&self, req: Request, handler: &BoxedHandler) -> Result<Response, Error> {
        dispatch(req, &self.stages, handler).await
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
