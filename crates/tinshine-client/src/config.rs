//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use tinshine_shared::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_AUTO_SYNC_MINUTES, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_UPDATE_CHECK_SECS, DEFAULT_WATCH_POLL_MS,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Env: `TINSHINE_API_BASE_URL`
    pub api_base_url: String,

    /// SQLite cache file. `None` uses the platform data directory.
    /// Env: `TINSHINE_CACHE_PATH`
    pub cache_path: Option<PathBuf>,

    /// Env: `TINSHINE_HTTP_TIMEOUT_SECS`
    pub http_timeout: Duration,

    /// Background resync interval.
    /// Env: `TINSHINE_AUTO_SYNC_MINUTES`
    pub auto_sync_interval: Duration,

    /// Foreground update check interval.
    /// Env: `TINSHINE_UPDATE_CHECK_SECS`
    pub update_check_interval: Duration,

    /// How often the shared cache is polled for changes by other clients.
    /// Env: `TINSHINE_WATCH_POLL_MS`
    pub watch_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_path: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            auto_sync_interval: Duration::from_secs(DEFAULT_AUTO_SYNC_MINUTES * 60),
            update_check_interval: Duration::from_secs(DEFAULT_UPDATE_CHECK_SECS),
            watch_poll_interval: Duration::from_millis(DEFAULT_WATCH_POLL_MS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = var("TINSHINE_API_BASE_URL") {
            if !url.is_empty() {
                config.api_base_url = url;
            }
        }

        if let Some(path) = var("TINSHINE_CACHE_PATH") {
            if !path.is_empty() {
                config.cache_path = Some(PathBuf::from(path));
            }
        }

        if let Some(secs) = positive(&var, "TINSHINE_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(minutes) = positive(&var, "TINSHINE_AUTO_SYNC_MINUTES") {
            config.auto_sync_interval = Duration::from_secs(minutes * 60);
        }
        if let Some(secs) = positive(&var, "TINSHINE_UPDATE_CHECK_SECS") {
            config.update_check_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = positive(&var, "TINSHINE_WATCH_POLL_MS") {
            config.watch_poll_interval = Duration::from_millis(ms);
        }

        config
    }
}

fn positive(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = var(key)?;
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid duration, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_vars(|_| None);
        assert_eq!(config.api_base_url, "http://localhost:3001/api");
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.auto_sync_interval, Duration::from_secs(15 * 60));
        assert_eq!(config.update_check_interval, Duration::from_secs(60));
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = ClientConfig::from_vars(|key| match key {
            "TINSHINE_API_BASE_URL" => Some("https://shop.example/api".into()),
            "TINSHINE_AUTO_SYNC_MINUTES" => Some("5".into()),
            "TINSHINE_HTTP_TIMEOUT_SECS" => Some("0".into()),
            "TINSHINE_WATCH_POLL_MS" => Some("fast".into()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "https://shop.example/api");
        assert_eq!(config.auto_sync_interval, Duration::from_secs(300));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.watch_poll_interval, Duration::from_millis(1000));
    }
}
