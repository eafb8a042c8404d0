//! Client configuration from environment variables.
//!
//! Defaults match the relay's own defaults so a local server and client work
//! with an empty environment.

use std::time::Duration;

use tracing::warn;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_CURSOR_THROTTLE_MS: u64 = 50;
const DEFAULT_CURSOR_TTL_MS: u64 = 5000;
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECT_BASE_MS: u64 = 1000;
const DEFAULT_RECONNECT_MAX_MS: u64 = 10_000;

const WS_PATH: &str = "/api/ws";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid server URL `{0}`: expected http(s):// or ws(s)://")]
pub struct InvalidServerUrl(pub String);

/// Reconnect budget and backoff curve for a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Retries after a failed or lost connection before giving up.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_MS),
            max_delay: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry `attempt` (1-based): doubles from `base_delay`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent).min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the relay, e.g. `http://127.0.0.1:3000`.
    pub server_url: String,
    /// Minimum interval between outbound cursor updates.
    pub cursor_throttle: Duration,
    /// Peer cursors older than this are dropped.
    pub cursor_ttl: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            cursor_throttle: Duration::from_millis(DEFAULT_CURSOR_THROTTLE_MS),
            cursor_ttl: Duration::from_millis(DEFAULT_CURSOR_TTL_MS),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server_url: std::env::var("WHITEBOARD_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_owned()),
            cursor_throttle: Duration::from_millis(env_parse("WHITEBOARD_CURSOR_THROTTLE_MS", DEFAULT_CURSOR_THROTTLE_MS)),
            cursor_ttl: Duration::from_millis(env_parse("WHITEBOARD_CURSOR_TTL_MS", DEFAULT_CURSOR_TTL_MS)),
            reconnect: ReconnectPolicy {
                max_attempts: env_parse("WHITEBOARD_RECONNECT_ATTEMPTS", DEFAULT_RECONNECT_ATTEMPTS),
                base_delay: Duration::from_millis(env_parse("WHITEBOARD_RECONNECT_BASE_MS", DEFAULT_RECONNECT_BASE_MS)),
                max_delay: Duration::from_millis(env_parse("WHITEBOARD_RECONNECT_MAX_MS", DEFAULT_RECONNECT_MAX_MS)),
            },
        }
    }

    /// Same config pointed at another server.
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// HTTP base for REST calls, without a trailing slash.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidServerUrl`] when the scheme is not http(s) or ws(s).
    pub fn http_base(&self) -> Result<String, InvalidServerUrl> {
        let (scheme, rest) = self.split_scheme()?;
        let scheme = match scheme {
            "ws" | "http" => "http",
            _ => "https",
        };
        Ok(format!("{scheme}://{rest}"))
    }

    /// Websocket endpoint of the relay.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidServerUrl`] when the scheme is not http(s) or ws(s).
    pub fn ws_url(&self) -> Result<String, InvalidServerUrl> {
        let (scheme, rest) = self.split_scheme()?;
        let scheme = match scheme {
            "ws" | "http" => "ws",
            _ => "wss",
        };
        Ok(format!("{scheme}://{rest}{WS_PATH}"))
    }

    fn split_scheme(&self) -> Result<(&str, &str), InvalidServerUrl> {
        let trimmed = self.server_url.trim().trim_end_matches('/');
        match trimmed.split_once("://") {
            Some((scheme @ ("http" | "https" | "ws" | "wss"), rest)) if !rest.is_empty() => Ok((scheme, rest)),
            _ => Err(InvalidServerUrl(self.server_url.clone())),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    raw.parse::<T>().unwrap_or_else(|_| {
        warn!(key, value = %raw, "ignoring unparsable environment value");
        default
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
