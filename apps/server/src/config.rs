use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;
use stockpulse_market_data::MarketDataConfig;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// Requests allowed per client IP within `rate_limit_window`.
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    /// Built frontend to serve for non-API paths, if any.
    pub static_dir: Option<String>,
    pub market_data: MarketDataConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            rate_limit_requests: 100,
            rate_limit_window: Duration::from_secs(15 * 60),
            static_dir: None,
            market_data: MarketDataConfig::default(),
        }
    }
}

impl Config {
    /// Read `SP_*` variables from the process environment. `main` loads
    /// `.env` first so its values are visible here.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let listen_addr: SocketAddr = std::env::var("SP_LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .context("Invalid SP_LISTEN_ADDR")?;
        let cors_allow = std::env::var("SP_CORS_ALLOW_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or(defaults.cors_allow);

        let timeout_ms = env_or("SP_REQUEST_TIMEOUT_MS", 30_000u64);

        let mut market_data = defaults.market_data;
        market_data.cache_ttl =
            Duration::from_secs(env_or("SP_CACHE_TTL_SECS", market_data.cache_ttl.as_secs()));
        market_data.fallback_ttl_divisor =
            env_or("SP_FALLBACK_TTL_DIVISOR", market_data.fallback_ttl_divisor);
        market_data.cache_degraded = env_or("SP_CACHE_DEGRADED", market_data.cache_degraded);
        market_data.provider_timeout = Duration::from_millis(env_or(
            "SP_PROVIDER_TIMEOUT_MS",
            market_data.provider_timeout.as_millis() as u64,
        ));
        market_data.batch_concurrency =
            env_or("SP_BATCH_CONCURRENCY", market_data.batch_concurrency);
        if let Ok(raw) = std::env::var("SP_PROVIDERS") {
            let providers = split_list(&raw);
            if !providers.is_empty() {
                market_data.provider_priority = providers;
            }
        }

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            rate_limit_requests: env_or("SP_RATE_LIMIT_REQUESTS", defaults.rate_limit_requests),
            rate_limit_window: Duration::from_secs(env_or(
                "SP_RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window.as_secs(),
            )),
            static_dir: std::env::var("SP_STATIC_DIR").ok().filter(|s| !s.is_empty()),
            market_data,
        })
    }
}

/// Parse `key` from the environment, keeping `default` when unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring malformed {}={:?}", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list_drops_blanks() {
        assert_eq!(split_list(" YAHOO, ,moneycontrol ,"), vec!["YAHOO", "moneycontrol"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.rate_limit_requests, 100);
        assert_eq!(config.rate_limit_window, Duration::from_secs(900));
        assert_eq!(config.cors_allow, vec!["*"]);
        assert_eq!(config.market_data.cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("SP_BATCH_CONCURRENCY", "9");
        std::env::set_var("SP_PROVIDERS", "moneycontrol, yahoo");
        let config = Config::from_env().unwrap();
        std::env::remove_var("SP_BATCH_CONCURRENCY");
        std::env::remove_var("SP_PROVIDERS");

        assert_eq!(config.market_data.batch_concurrency, 9);
        assert_eq!(config.market_data.provider_priority, vec!["moneycontrol", "yahoo"]);
        assert_eq!(config.rate_limit_requests, 100);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        std::env::set_var("SP_TEST_ENV_OR_GARBAGE", "not-a-number");
        assert_eq!(env_or("SP_TEST_ENV_OR_GARBAGE", 7u32), 7);
        std::env::set_var("SP_TEST_ENV_OR_GARBAGE", " 12 ");
        assert_eq!(env_or("SP_TEST_ENV_OR_GARBAGE", 7u32), 12);
        std::env::remove_var("SP_TEST_ENV_OR_GARBAGE");
        assert_eq!(env_or("SP_TEST_ENV_OR_GARBAGE", 7u32), 7);
    }
}
