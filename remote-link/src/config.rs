//! Link timing configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RECONNECT_BASE_MS: u64 = 1_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Timeouts and reconnect policy for one [`crate::RemoteLinkClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Bound on the transport reaching the open state.
    pub connect_timeout: Duration,
    /// Bound on a request waiting for its correlated response.
    pub request_timeout: Duration,
    /// Reconnect `n` waits `n * reconnect_base_delay` (linear backoff).
    pub reconnect_base_delay: Duration,
    /// Automatic reconnects allowed after an unexpected close.
    pub max_reconnect_attempts: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            reconnect_base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl LinkConfig {
    /// Build link config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `REMOTE_LINK_CONNECT_TIMEOUT_MS`: default 5000
    /// - `REMOTE_LINK_REQUEST_TIMEOUT_MS`: default 10000
    /// - `REMOTE_LINK_RECONNECT_BASE_MS`: default 1000
    /// - `REMOTE_LINK_RECONNECT_MAX_ATTEMPTS`: default 5
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            connect_timeout: Duration::from_millis(env_parse(
                "REMOTE_LINK_CONNECT_TIMEOUT_MS",
                DEFAULT_CONNECT_TIMEOUT_MS,
            )),
            request_timeout: Duration::from_millis(env_parse(
                "REMOTE_LINK_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )),
            reconnect_base_delay: Duration::from_millis(env_parse(
                "REMOTE_LINK_RECONNECT_BASE_MS",
                DEFAULT_RECONNECT_BASE_MS,
            )),
            max_reconnect_attempts: env_parse(
                "REMOTE_LINK_RECONNECT_MAX_ATTEMPTS",
                DEFAULT_MAX_RECONNECT_ATTEMPTS,
            ),
        }
    }

    /// Wait before reconnect number `attempt` (1-based).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.reconnect_base_delay.saturating_mul(attempt)
    }
}

/// Parse env var `key` as `T`, falling back to `default` when it is unset or
/// does not parse.
#[must_use]
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
