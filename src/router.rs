//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. The router also carries
//! the [`Pipeline`] of stages; [`Router::build`] resolves every route's chain
//! once, so nothing is assembled per request.

use std::collections::HashMap;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Middleware, Scope, SharedMiddleware};
use crate::pipeline::{Chain, Pipeline, PipelineBuilder};
use crate::request::{Request, RequestBuilder};
use crate::response::Response;

/// The application router.
///
/// ```rust,no_run
/// # use tollgate::{Method, Request, Response, Router};
/// # use tollgate::middleware::ProfilingStage;
/// # async fn get_product(_: Request) -> Response { Response::text("") }
/// # async fn create_product(_: Request) -> Response { Response::text("") }
/// let app = Router::new()
///     .on(Method::GET,  "/products/{id}", get_product)
///     .on(Method::POST, "/products",      create_product)
///     .layer(ProfilingStage::new())
///     .build()
///     .unwrap();
/// ```
pub struct Router {
    routes: Vec<(Method, String, BoxedHandler)>,
    pipeline: PipelineBuilder,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new(), pipeline: Pipeline::builder() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes.push((method, path.to_owned(), handler.into_boxed_handler()));
        self
    }

    /// Adds a stage that runs for every request, matched or not.
    pub fn layer(mut self, stage: impl Middleware) -> Self {
        self.pipeline = self.pipeline.stage(Scope::Global, stage);
        self
    }

    /// Adds a stage that runs only for requests matched to the route
    /// registered with `method` and `pattern`, inside every global stage.
    pub fn route_layer(mut self, method: Method, pattern: &str, stage: impl Middleware) -> Self {
        self.pipeline = self.pipeline.stage(Scope::route(method, pattern), stage);
        self
    }

    /// Adds a stage the caller also holds a handle to.
    pub fn shared_layer(mut self, scope: Scope, stage: SharedMiddleware) -> Self {
        self.pipeline = self.pipeline.shared_stage(scope, stage);
        self
    }

    /// Freezes routes and stages.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for a malformed or conflicting route pattern, or for
    /// a route-scoped stage whose method and pattern match no route.
    pub fn build(self) -> Result<App, Error> {
        let pipeline = self.pipeline.build();

        for (method, pattern) in pipeline.route_scopes() {
            let registered = self.routes.iter().any(|(m, p, _)| m == method && p == pattern);
            if !registered {
                return Err(Error::config(format!(
                    "route stage for `{method} {pattern}` matches no registered route"
                )));
            }
        }

        let mut trees: HashMap<Method, MatchitRouter<Endpoint>> = HashMap::new();

        for (method, path, handler) in self.routes {
            let endpoint = Endpoint {
                chain: pipeline.chain_for(Some((&method, path.as_str()))),
                handler,
                pattern: path.clone(),
            };
            trees
                .entry(method)
                .or_default()
                .insert(path.as_str(), endpoint)
                .map_err(|e| Error::config(format!("invalid route `{path}`: {e}")))?;
        }

        Ok(App {
            trees,
            fallback: Endpoint {
                chain: pipeline.chain_for(None),
                handler: not_found.into_boxed_handler(),
                pattern: String::new(),
            },
        })
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

struct Endpoint {
    chain: Chain,
    handler: BoxedHandler,
    pattern: String,
}

/// A built router: every route resolved to its handler and stage chain.
///
/// Shared by all connection tasks behind an `Arc`.
pub struct App {
    trees: HashMap<Method, MatchitRouter<Endpoint>>,
    fallback: Endpoint,
}

impl App {
    /// Routes `req` and runs it through its chain.
    ///
    /// Unmatched requests pass through the global stages before the `404`.
    pub async fn call(&self, req: RequestBuilder) -> Result<Response, Error> {
        let (method, path) = req.target();
        let (method, path) = (method.clone(), path.to_owned());

        match self.trees.get(&method).and_then(|tree| tree.at(&path).ok()) {
            Some(matched) => {
                let params = matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                let endpoint = matched.value;
                let req = req.route(&endpoint.pattern).params(params).build();
                endpoint.chain.dispatch(req, &endpoint.handler).await
            }
            None => self.fallback.chain.dispatch(req.build(), &self.fallback.handler).await,
        }
    }
}

async fn not_found(_req: Request) -> StatusCode {
    StatusCode::NOT_FOUND
}
