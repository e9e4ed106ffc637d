//! Observability events emitted by the pipeline stages.
//!
//! Stages hand events to an [`EventSink`]. Emission is synchronous and must
//! not block: a sink that needs I/O should queue and return. The default sink,
//! [`TracingSink`], turns every event into a `tracing` record under the
//! `tollgate::pipeline` target.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

/// Something a stage observed while processing a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineEvent {
    /// The rate limiter refused a request.
    RateLimitRejected {
        address: Option<SocketAddr>,
        route: String,
    },
    /// The profiling stage measured one pass through the rest of the chain.
    RequestTimed { route: String, elapsed: Duration },
    /// An action hook saw its handler complete.
    ActionExecuted { route: String },
}

/// Destination for [`PipelineEvent`]s. Fire-and-forget.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: PipelineEvent);
}

pub type SharedSink = Arc<dyn EventSink>;

/// Writes events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    pub(crate) fn shared() -> SharedSink {
        Arc::new(Self)
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::RateLimitRejected { address, route } => {
                let address = display_addr(address);
                warn!(target: "tollgate::pipeline", %address, %route, "rate limit exceeded");
            }
            PipelineEvent::RequestTimed { route, elapsed } => {
                info!(
                    target: "tollgate::pipeline",
                    %route,
                    elapsed_ms = millis(elapsed),
                    "request {route} took {} ms",
                    elapsed.as_millis(),
                );
            }
            PipelineEvent::ActionExecuted { route } => {
                info!(target: "tollgate::pipeline", %route, "action executed");
            }
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn display_addr(address: Option<SocketAddr>) -> String {
    address.map_or_else(|| "unknown".to_owned(), |a| a.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_micros(2_500)), 2);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn unknown_address() {
        assert_eq!(display_addr(None), "unknown");
        assert_eq!(display_addr(Some("10.1.2.3:80".parse().unwrap())), "10.1.2.3");
    }
}
