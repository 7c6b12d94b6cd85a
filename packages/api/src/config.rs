//! Client configuration and the bearer token seam.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Base URL of the production map API.
pub const DEFAULT_BASE_URL: &str = "https://haripurcms.tachyonwave.com.np/haripur/api/v1/map";

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Map API client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapApiConfig {
    /// Base URL, without the `/layers/` or `/data/` suffix.
    pub base_url: String,
    /// Timeout applied to each individual attempt.
    pub timeout: Duration,
    /// Retry behaviour for transient failures.
    pub retry: RetryPolicy,
}

impl Default for MapApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl MapApiConfig {
    /// Builds a configuration from environment variables, falling back to
    /// the defaults:
    ///
    /// - `MAP_API_BASE_URL`
    /// - `MAP_API_TIMEOUT_SECS`
    /// - `MAP_API_MAX_ATTEMPTS`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] but reads variables through `lookup`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(base_url) = lookup("MAP_API_BASE_URL").filter(|s| !s.trim().is_empty()) {
            config.base_url = base_url.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup("MAP_API_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => log::warn!("Ignoring invalid MAP_API_TIMEOUT_SECS={raw:?}"),
            }
        }

        if let Some(raw) = lookup("MAP_API_MAX_ATTEMPTS") {
            match raw.trim().parse::<u32>() {
                Ok(attempts) if attempts > 0 => config.retry.max_attempts = attempts,
                _ => log::warn!("Ignoring invalid MAP_API_MAX_ATTEMPTS={raw:?}"),
            }
        }

        config
    }
}

/// Supplies the bearer token attached to API requests.
///
/// Session handling lives outside this crate; the client only asks for
/// the current token before each request.
pub trait TokenProvider: Send + Sync {
    /// Returns the token, or `None` to send the request unauthenticated.
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token (or none).
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    /// Reads the token from `MAP_API_TOKEN`.
    #[must_use]
    pub fn from_env() -> Self {
        Self(
            std::env::var("MAP_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        )
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}
