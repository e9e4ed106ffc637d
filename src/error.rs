//! Unified error type.

/// A boxed, thread-safe error raised by a collaborator (usually a handler).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by tollgate's fallible operations.
///
/// Application-level outcomes (404, 429, etc.) are expressed as
/// [`Response`](crate::Response) values, not as `Error`s. A rejected request is
/// a normal pipeline outcome. This type surfaces faults: bad configuration,
/// a handler or stage that failed unexpectedly, and socket I/O.
///
/// Stages never swallow an `Error`. It travels up the chain unchanged and the
/// server renders it as `500 Internal Server Error`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration, rejected at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The handler failed.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// A pipeline stage failed on its own account.
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wraps a collaborator fault as a handler failure.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// Wraps a fault raised by the named stage.
    pub fn stage(stage: &'static str, err: impl Into<BoxError>) -> Self {
        Self::Stage { stage, source: err.into() }
    }

    /// Returns `true` for configuration faults.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
