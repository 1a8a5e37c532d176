//! Tunables for the aggregation layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{default_indices, TrackedIndex};
use crate::provider::{moneycontrol::MONEYCONTROL_PROVIDER_ID, yahoo::YAHOO_PROVIDER_ID};
use crate::registry::{ProviderTier, DEFAULT_PROVIDER_TIMEOUT};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_FALLBACK_TTL_DIVISOR: u32 = 2;
const DEFAULT_BATCH_CONCURRENCY: usize = 5;

/// Configuration of a [`MarketDataService`](crate::MarketDataService).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// TTL of a record produced by the primary provider.
    pub cache_ttl: Duration,

    /// A record from a fallback provider lives `cache_ttl / fallback_ttl_divisor`.
    pub fallback_ttl_divisor: u32,

    /// Whether degraded records are cached at all.
    pub cache_degraded: bool,

    /// TTL of a degraded record; `cache_ttl` when unset.
    pub degraded_ttl: Option<Duration>,

    /// Upper bound for a single provider attempt.
    pub provider_timeout: Duration,

    /// Maximum single-symbol resolutions in flight per batch.
    pub batch_concurrency: usize,

    /// Provider ids in the order they are tried.
    pub provider_priority: Vec<String>,

    /// Indices returned by `get_indices`.
    pub indices: Vec<TrackedIndex>,

    /// Background purge period; a fifth of `cache_ttl` when unset.
    pub sweep_interval: Option<Duration>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            fallback_ttl_divisor: DEFAULT_FALLBACK_TTL_DIVISOR,
            cache_degraded: true,
            degraded_ttl: None,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            provider_priority: vec![
                YAHOO_PROVIDER_ID.to_string(),
                MONEYCONTROL_PROVIDER_ID.to_string(),
            ],
            indices: default_indices(),
            sweep_interval: None,
        }
    }
}

impl MarketDataConfig {
    /// TTL for a record produced at `tier`, or `None` when it must not be cached.
    pub fn ttl_for(&self, tier: ProviderTier) -> Option<Duration> {
        match tier {
            ProviderTier::Primary => Some(self.cache_ttl),
            ProviderTier::Fallback => Some(self.fallback_ttl()),
            ProviderTier::Degraded if self.cache_degraded => {
                Some(self.degraded_ttl.unwrap_or(self.cache_ttl))
            }
            ProviderTier::Degraded => None,
        }
    }

    pub fn fallback_ttl(&self) -> Duration {
        self.cache_ttl / self.fallback_ttl_divisor.max(1)
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.cache_ttl / 5)
    }

    /// Batch concurrency, never below one.
    pub fn batch_limit(&self) -> usize {
        self.batch_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MarketDataConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.provider_timeout, Duration::from_secs(5));
        assert_eq!(config.batch_limit(), 5);
        assert_eq!(config.provider_priority, vec!["YAHOO", "MONEYCONTROL"]);
        assert_eq!(config.indices.len(), 5);
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_ttl_by_tier() {
        let config = MarketDataConfig::default();
        assert_eq!(config.ttl_for(ProviderTier::Primary), Some(Duration::from_secs(300)));
        assert_eq!(config.ttl_for(ProviderTier::Fallback), Some(Duration::from_secs(150)));
        assert_eq!(config.ttl_for(ProviderTier::Degraded), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_degraded_ttl_override_and_disable() {
        let mut config = MarketDataConfig {
            degraded_ttl: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        assert_eq!(config.ttl_for(ProviderTier::Degraded), Some(Duration::from_secs(30)));

        config.cache_degraded = false;
        assert_eq!(config.ttl_for(ProviderTier::Degraded), None);
    }

    #[test]
    fn test_zero_divisor_and_concurrency_are_clamped() {
        let config = MarketDataConfig {
            fallback_ttl_divisor: 0,
            batch_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(config.fallback_ttl(), config.cache_ttl);
        assert_eq!(config.batch_limit(), 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: MarketDataConfig =
            serde_json::from_str(r#"{"cache_degraded": false}"#).unwrap();
        assert!(!config.cache_degraded);
        assert_eq!(config.fallback_ttl_divisor, 2);
    }
}
