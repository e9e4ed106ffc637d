//! Runtime configuration.
//!
//! Both types deserialize with serde and fall back to defaults for missing
//! fields. [`Config::from_env`] reads `TOLLGATE_*` variables:
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `TOLLGATE_BIND` | listen address | `0.0.0.0:3000` |
//! | `TOLLGATE_RATE_LIMIT` | requests admitted per window | `5` |
//! | `TOLLGATE_RATE_WINDOW` | window length, e.g. `10s`, `1m 30s` | `10s` |

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Fixed-window limiter settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per window.
    pub limit: u32,
    /// Window length.
    #[serde(with = "duration_str")]
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { limit: 5, window: Duration::from_secs(10) }
    }
}

impl RateLimitConfig {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// # Errors
    ///
    /// [`Error::Config`] when the limit or the window is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.limit == 0 {
            return Err(Error::config("rate limit must be greater than 0"));
        }
        if self.window.is_zero() {
            return Err(Error::config("rate window must be greater than 0"));
        }
        Ok(())
    }
}

/// Server configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: SocketAddr,
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Reads `TOLLGATE_*` from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, a key → value function.
    ///
    /// Unset keys keep their defaults; set but unparsable keys are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(bind) = lookup("TOLLGATE_BIND") {
            config.bind = bind
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("TOLLGATE_BIND `{bind}`: {e}")))?;
        }
        if let Some(limit) = lookup("TOLLGATE_RATE_LIMIT") {
            config.rate_limit.limit = limit
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("TOLLGATE_RATE_LIMIT `{limit}`: {e}")))?;
        }
        if let Some(window) = lookup("TOLLGATE_RATE_WINDOW") {
            config.rate_limit.window = humantime::parse_duration(window.trim())
                .map_err(|e| Error::config(format!("TOLLGATE_RATE_WINDOW `{window}`: {e}")))?;
        }

        config.rate_limit.validate()?;
        Ok(config)
    }
}

/// Serde adapter writing durations in humantime form (`10s`).
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
