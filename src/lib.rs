//! # tollgate
//!
//! A minimal HTTP framework whose requests travel through an explicit,
//! ordered pipeline of stages before and after the handler.
//!
//! ## The pipeline
//!
//! ```text
//! server → RateLimiter → ProfilingStage → ActionHookStage(before) → handler
//!                                          ActionHookStage(after)  ←
//!                        ProfilingStage(elapsed)                   ←
//!        ← response
//! ```
//!
//! - [`RateLimiter`](middleware::RateLimiter): fixed-window admission
//!   control shared by every request; `429` once the window is full
//! - [`ProfilingStage`](middleware::ProfilingStage): elapsed time of the
//!   rest of the chain, success or fault
//! - [`ActionHookStage`](middleware::ActionHookStage): before/after hooks
//!   around the handler; `before` may answer on the handler's behalf
//!
//! Stages are registered once at startup, either globally or for a single
//! route. Global stages always wrap route-scoped ones. A stage that answers
//! without calling the rest of the chain short-circuits it; a fault
//! ([`Error`]) travels back to the server untouched and becomes a `500`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tollgate::middleware::{ActionHookStage, LogActivity, ProfilingStage, RateLimiter};
//! use tollgate::{Config, Method, Request, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tollgate::Error> {
//!     let config = Config::from_env()?;
//!
//!     let app = Router::new()
//!         .on(Method::GET,  "/products/{id}", get_product)
//!         .on(Method::POST, "/products",      create_product)
//!         .layer(RateLimiter::new(config.rate_limit)?)
//!         .layer(ProfilingStage::new())
//!         .layer(ActionHookStage::new(LogActivity));
//!
//!     Server::from_config(&config).serve(app).await
//! }
//!
//! async fn get_product(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_product(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/products/99")
//!         .json(r#"{"id":99}"#)
//! }
//! ```

mod config;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod clock;
pub mod events;
pub mod middleware;
pub mod pipeline;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use config::{Config, RateLimitConfig};
pub use error::{BoxError, Error};
#[doc(hidden)]
pub use handler::BoxedHandler;
pub use handler::{Handler, IntoOutcome};
pub use http::{Method, StatusCode};
pub use pipeline::Pipeline;
pub use request::{Request, RequestBuilder};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{App, Router};
pub use server::{serve_with_shutdown, Server};
