//! Token bucket rate limiter.
//!
//! Keeps one bucket per key. The registry keys buckets by provider id so we
//! stay under each upstream's limits; the HTTP server reuses the same limiter
//! keyed by client address.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

/// Default rate limit: 60 requests per minute.
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 60;

/// Default bucket capacity (allows bursting).
const DEFAULT_BUCKET_CAPACITY: f64 = 10.0;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Tokens per second.
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn with_config(config: &RateLimitConfig) -> Self {
        Self {
            tokens: config.burst_capacity,
            last_update: Instant::now(),
            rate: config.rate_per_second,
            capacity: config.burst_capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 || self.rate <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }

    /// A full bucket that has not been touched for `idle` carries no state
    /// worth keeping.
    fn is_idle(&mut self, idle: Duration) -> bool {
        let untouched = self.last_update.elapsed() >= idle;
        self.refill();
        untouched && self.tokens >= self.capacity
    }
}

/// Rate limit for one bucket.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    /// Refill rate in tokens per second.
    pub rate_per_second: f64,
    /// Maximum burst capacity.
    pub burst_capacity: f64,
}

impl RateLimitConfig {
    /// `requests` per minute with the given burst.
    pub fn per_minute(requests: u32, burst_capacity: f64) -> Self {
        Self {
            rate_per_second: f64::from(requests) / 60.0,
            burst_capacity,
        }
    }

    /// `requests` per `window`, all of which may be spent at once.
    ///
    /// ```
    /// use std::time::Duration;
    /// use stockpulse_market_data::registry::RateLimitConfig;
    ///
    /// let config = RateLimitConfig::per_window(100, Duration::from_secs(900));
    /// assert_eq!(config.burst_capacity, 100.0);
    /// ```
    pub fn per_window(requests: u32, window: Duration) -> Self {
        let secs = window.as_secs_f64().max(f64::EPSILON);
        Self {
            rate_per_second: f64::from(requests) / secs,
            burst_capacity: f64::from(requests),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(DEFAULT_REQUESTS_PER_MINUTE, DEFAULT_BUCKET_CAPACITY)
    }
}

/// Token bucket rate limiter for many keys.
///
/// Buckets are created on demand from the per-key configuration when one
/// was registered, otherwise from the limiter's default.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    configs: Mutex<HashMap<String, RateLimitConfig>>,
    default_config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter with default settings.
    pub fn new() -> Self {
        Self::with_default(RateLimitConfig::default())
    }

    /// Create a rate limiter whose unconfigured keys use `config`.
    pub fn with_default(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            configs: Mutex::new(HashMap::new()),
            default_config: config,
        }
    }

    /// Lock the buckets mutex, recovering from poison if necessary.
    ///
    /// The worst case after recovering is slightly incorrect rate limiting,
    /// which is better than panicking.
    fn lock_buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter buckets mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_configs(&self) -> MutexGuard<'_, HashMap<String, RateLimitConfig>> {
        self.configs.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter configs mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure rate limits for a specific key.
    pub fn configure(&self, key: &str, config: RateLimitConfig) {
        let mut configs = self.lock_configs();
        configs.insert(key.to_string(), config);
        drop(configs); // Release configs lock before acquiring buckets lock

        // Start over with a bucket built from the new config
        self.lock_buckets().remove(key);
    }

    /// Acquire a token for `key`, waiting asynchronously until one is available.
    pub async fn acquire(&self, key: &str) {
        loop {
            let wait_time = {
                let mut buckets = self.lock_buckets();
                let bucket = buckets
                    .entry(key.to_string())
                    .or_insert_with(|| self.create_bucket(key));

                if bucket.try_acquire() {
                    debug!("Rate limiter: acquired token for '{}'", key);
                    return;
                }

                bucket.time_until_available()
            };

            if wait_time.is_zero() {
                // Zero refill rate: the bucket will never recover, don't spin.
                warn!("Rate limiter: '{}' has no refill rate, not waiting", key);
                return;
            }

            debug!("Rate limiter: waiting {:?} for '{}'", wait_time, key);
            tokio::time::sleep(wait_time).await;
        }
    }

    /// Try to acquire a token without waiting.
    ///
    /// Returns true if a token was acquired, false if rate limited.
    pub fn try_acquire(&self, key: &str) -> bool {
        let mut buckets = self.lock_buckets();

        buckets
            .entry(key.to_string())
            .or_insert_with(|| self.create_bucket(key))
            .try_acquire()
    }

    /// Remaining tokens for `key`.
    pub fn remaining_tokens(&self, key: &str) -> f64 {
        let mut buckets = self.lock_buckets();

        match buckets.get_mut(key) {
            Some(bucket) => {
                bucket.refill();
                bucket.tokens
            }
            None => self.config_for(key).burst_capacity,
        }
    }

    /// Drop buckets that have been idle for at least `idle` and refilled
    /// completely. Returns how many were dropped.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let mut buckets = self.lock_buckets();
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_idle(idle));
        before - buckets.len()
    }

    /// Number of live buckets.
    pub fn tracked_keys(&self) -> usize {
        self.lock_buckets().len()
    }

    fn config_for(&self, key: &str) -> RateLimitConfig {
        self.lock_configs()
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone())
    }

    fn create_bucket(&self, key: &str) -> TokenBucket {
        TokenBucket::with_config(&self.config_for(key))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_acquire_exhausts_burst() {
        let limiter = RateLimiter::with_default(RateLimitConfig::per_minute(60, 3.0));

        assert!(limiter.try_acquire("YAHOO"));
        assert!(limiter.try_acquire("YAHOO"));
        assert!(limiter.try_acquire("YAHOO"));
        assert!(!limiter.try_acquire("YAHOO"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::with_default(RateLimitConfig::per_minute(60, 1.0));

        assert!(limiter.try_acquire("10.0.0.1"));
        assert!(!limiter.try_acquire("10.0.0.1"));
        assert!(limiter.try_acquire("10.0.0.2"));
    }

    #[test]
    fn test_configure_overrides_default() {
        let limiter = RateLimiter::new();
        limiter.configure("MONEYCONTROL", RateLimitConfig::per_minute(60, 1.0));

        assert_eq!(limiter.remaining_tokens("MONEYCONTROL"), 1.0);
        assert_eq!(limiter.remaining_tokens("YAHOO"), DEFAULT_BUCKET_CAPACITY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_refills_over_time() {
        let limiter =
            RateLimiter::with_default(RateLimitConfig::per_window(2, Duration::from_secs(10)));

        assert!(limiter.try_acquire("client"));
        assert!(limiter.try_acquire("client"));
        assert!(!limiter.try_acquire("client"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(limiter.try_acquire("client"));
        assert!(!limiter.try_acquire("client"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::with_default(RateLimitConfig::per_minute(60, 1.0));
        limiter.acquire("YAHOO").await;

        let start = Instant::now();
        limiter.acquire("YAHOO").await;
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_drops_only_refilled_buckets() {
        let limiter =
            RateLimiter::with_default(RateLimitConfig::per_window(10, Duration::from_secs(100)));

        assert!(limiter.try_acquire("idle"));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(limiter.try_acquire("busy"));

        assert_eq!(limiter.evict_idle(Duration::from_secs(30)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
