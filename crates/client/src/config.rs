//! Client configuration from environment variables, and the REST and
//! WebSocket origins derived from it.

use std::path::PathBuf;
use std::time::Duration;

/// Default delay between channel reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;

/// Client configuration loaded from environment variables.
///
/// Endpoint URLs are normally derived from the `domain` preference; the
/// `*_BASE_URL` variables override that for deployments where REST and
/// WebSocket live on different origins or behind TLS.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Location of the persisted preference file.
    pub prefs_path: PathBuf,
    pub api_base_override: Option<String>,
    pub ws_base_override: Option<String>,
    /// Fixed wait after a dropped channel before reconnecting.
    pub reconnect_delay: Duration,
    /// Session cookie forwarded on REST calls (`name=value`).
    pub session_cookie: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `RETRIAGE_PREFS_PATH`        | `retriage-prefs.json`   |
    /// | `RETRIAGE_API_BASE_URL`      | `http://{domain}`       |
    /// | `RETRIAGE_WS_BASE_URL`       | `ws://{domain}`         |
    /// | `RETRIAGE_RECONNECT_DELAY_MS`| `5000`                  |
    /// | `RETRIAGE_SESSION_COOKIE`    | unset                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from any lookup
    /// function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let prefs_path = non_empty("RETRIAGE_PREFS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("retriage-prefs.json"));

        let reconnect_delay_ms = match non_empty("RETRIAGE_RECONNECT_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::Invalid {
                    key: "RETRIAGE_RECONNECT_DELAY_MS",
                    value: raw,
                })?,
            None => DEFAULT_RECONNECT_DELAY_MS,
        };

        Ok(Self {
            prefs_path,
            api_base_override: non_empty("RETRIAGE_API_BASE_URL"),
            ws_base_override: non_empty("RETRIAGE_WS_BASE_URL"),
            reconnect_delay: Duration::from_millis(reconnect_delay_ms),
            session_cookie: non_empty("RETRIAGE_SESSION_COOKIE"),
        })
    }

    /// Resolve REST and WebSocket base URLs for the stored backend domain.
    pub fn endpoints(&self, domain: &str) -> Endpoints {
        let defaults = Endpoints::from_domain(domain);
        Endpoints {
            api_base_url: self
                .api_base_override
                .as_deref()
                .map(trim_slash)
                .unwrap_or(defaults.api_base_url),
            ws_base_url: self
                .ws_base_override
                .as_deref()
                .map(trim_slash)
                .unwrap_or(defaults.ws_base_url),
        }
    }
}

/// Base URLs for the two transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// e.g. `http://localhost:8080`
    pub api_base_url: String,
    /// e.g. `ws://localhost:8080`
    pub ws_base_url: String,
}

impl Endpoints {
    pub fn from_domain(domain: &str) -> Self {
        let domain = domain.trim().trim_end_matches('/');
        Self {
            api_base_url: format!("http://{domain}"),
            ws_base_url: format!("ws://{domain}"),
        }
    }
}

fn trim_slash(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value: '{value}'")]
    Invalid { key: &'static str, value: String },
}
