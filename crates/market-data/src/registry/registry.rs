//! Provider registry for orchestrating market data providers.
//!
//! The registry owns the ordered fallback chain. For each request it:
//! - Walks providers in priority order
//! - Skips providers whose circuit is open
//! - Applies the provider's rate limit
//! - Bounds the whole attempt with the per-provider timeout
//! - Accepts the first record that passes validation
//!
//! Quote fetches never fail: when every provider is exhausted the caller gets
//! a degraded record instead.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::circuit_breaker::CircuitMetrics;
use super::rate_limiter::RateLimitConfig;
use super::skip_reason::{FetchDiagnostics, SkipReason};
use super::{CircuitBreaker, QuoteValidator, RateLimiter};
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{IndexRecord, ProviderId, QuoteRecord, Symbol, TrackedIndex, NO_SOURCE_REASON};
use crate::provider::MarketDataProvider;

/// Default upper bound for one provider attempt.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Position of the producing provider in the chain.
///
/// The cache derives the entry TTL from this.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProviderTier {
    /// First provider in priority order.
    Primary,
    /// Any later provider.
    Fallback,
    /// No provider produced a usable record.
    Degraded,
}

impl fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// Result of one pass through the fallback chain.
#[derive(Clone, Debug)]
pub struct FetchOutcome {
    pub record: QuoteRecord,
    pub tier: ProviderTier,
    pub diagnostics: FetchDiagnostics,
}

/// Provider registry for orchestrating market data fetching.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    provider_timeout: Duration,
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    validator: QuoteValidator,
}

impl ProviderRegistry {
    /// Create a registry that tries `providers` in the given order.
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>, provider_timeout: Duration) -> Self {
        Self::with_config(
            providers,
            provider_timeout,
            RateLimiter::new(),
            CircuitBreaker::new(),
            QuoteValidator::new(),
        )
    }

    /// Create a registry ordered by `priority`.
    ///
    /// Provider ids are matched case-insensitively. Providers missing from the
    /// list are not consulted; unknown ids in the list are ignored.
    pub fn with_priority(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        priority: &[String],
        provider_timeout: Duration,
    ) -> Self {
        let mut ordered: Vec<Arc<dyn MarketDataProvider>> = Vec::with_capacity(priority.len());
        for id in priority {
            let Some(provider) = providers.iter().find(|p| p.id().eq_ignore_ascii_case(id)) else {
                warn!("Unknown provider '{}' in priority list, ignoring", id);
                continue;
            };
            if !ordered.iter().any(|o| o.id() == provider.id()) {
                ordered.push(Arc::clone(provider));
            }
        }
        Self::new(ordered, provider_timeout)
    }

    /// Create a registry with custom components.
    pub fn with_config(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        provider_timeout: Duration,
        rate_limiter: RateLimiter,
        circuit_breaker: CircuitBreaker,
        validator: QuoteValidator,
    ) -> Self {
        for provider in &providers {
            let limit = provider.rate_limit();
            rate_limiter.configure(
                provider.id(),
                RateLimitConfig::per_minute(
                    limit.requests_per_minute,
                    limit.max_concurrency.max(1) as f64,
                ),
            );
        }

        Self {
            providers,
            provider_timeout,
            rate_limiter,
            circuit_breaker,
            validator,
        }
    }

    /// Ids of the providers in chain order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Circuit state of every provider that has been called.
    pub fn circuit_metrics(&self) -> Vec<CircuitMetrics> {
        self.circuit_breaker.metrics()
    }

    /// Fetch the latest quote for `symbol` through the fallback chain.
    ///
    /// Never fails. The outcome's tier tells whether the primary provider, a
    /// fallback provider, or nobody produced the record.
    pub async fn fetch_quote(&self, symbol: &Symbol) -> FetchOutcome {
        let mut diagnostics = FetchDiagnostics::new();

        for (position, provider) in self.providers.iter().enumerate() {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if !provider.capabilities().supports_quotes {
                diagnostics.record_skip(provider_id, SkipReason::OperationNotSupported);
                continue;
            }

            if !self.circuit_breaker.is_allowed(&provider_id) {
                debug!(
                    "Circuit breaker open for provider '{}', skipping {}",
                    provider_id, symbol
                );
                diagnostics.record_skip(provider_id, SkipReason::CircuitBreakerOpen);
                continue;
            }

            debug!("Fetching quote for {} from '{}'", symbol, provider_id);

            let attempt = self
                .bounded(&provider_id, provider.fetch_quote(symbol))
                .await
                .and_then(|record| self.validator.validate(&record).map(|()| record));

            match attempt {
                Ok(mut record) => {
                    self.circuit_breaker.record_success(&provider_id);
                    diagnostics.record_success(provider_id.clone());

                    if record.source.is_none() {
                        record.source = Some(provider_id.to_string());
                    }

                    let tier = if position == 0 {
                        ProviderTier::Primary
                    } else {
                        ProviderTier::Fallback
                    };
                    info!("Quote for {} served by '{}' ({})", symbol, provider_id, tier);

                    return FetchOutcome {
                        record,
                        tier,
                        diagnostics,
                    };
                }
                Err(e) => {
                    self.record_failure(&provider_id, &e);
                    diagnostics.record_error(provider_id, &e);
                }
            }
        }

        warn!(
            "No provider produced a quote for {}: [{}]",
            symbol,
            diagnostics.summary()
        );

        FetchOutcome {
            record: QuoteRecord::degraded(symbol.as_str(), NO_SOURCE_REASON),
            tier: ProviderTier::Degraded,
            diagnostics,
        }
    }

    /// Fetch snapshots for `tracked` from the first index-capable provider
    /// that returns at least one usable record.
    ///
    /// Records without a value are dropped. Returns `IndicesUnavailable` when
    /// no provider produced anything.
    pub async fn fetch_indices(
        &self,
        tracked: &[TrackedIndex],
    ) -> Result<(Vec<IndexRecord>, ProviderTier), MarketDataError> {
        let mut diagnostics = FetchDiagnostics::new();

        for (position, provider) in self.providers.iter().enumerate() {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            if !provider.capabilities().supports_indices {
                diagnostics.record_skip(provider_id, SkipReason::OperationNotSupported);
                continue;
            }

            if !self.circuit_breaker.is_allowed(&provider_id) {
                diagnostics.record_skip(provider_id, SkipReason::CircuitBreakerOpen);
                continue;
            }

            match self
                .bounded(&provider_id, provider.fetch_indices(tracked))
                .await
            {
                Ok(records) => {
                    let fetched = records.len();
                    let usable: Vec<_> = records
                        .into_iter()
                        .filter(|r| self.validator.is_usable_index(r))
                        .collect();

                    if usable.is_empty() {
                        debug!(
                            "Provider '{}' returned no usable indices ({} fetched)",
                            provider_id, fetched
                        );
                        diagnostics.record_error(provider_id, "no usable indices");
                        continue;
                    }

                    self.circuit_breaker.record_success(&provider_id);
                    diagnostics.record_success(provider_id.clone());
                    info!(
                        "Fetched {}/{} indices from '{}'",
                        usable.len(),
                        tracked.len(),
                        provider_id
                    );

                    let tier = if position == 0 {
                        ProviderTier::Primary
                    } else {
                        ProviderTier::Fallback
                    };
                    return Ok((usable, tier));
                }
                Err(e) => {
                    self.record_failure(&provider_id, &e);
                    diagnostics.record_error(provider_id, &e);
                }
            }
        }

        warn!("No provider produced indices: [{}]", diagnostics.summary());
        Err(MarketDataError::IndicesUnavailable)
    }

    /// Run one provider attempt under its rate limit and the per-provider timeout.
    ///
    /// Waiting for a rate limit token counts against the timeout, so a
    /// saturated provider cannot stall the chain.
    async fn bounded<T, F>(&self, provider_id: &ProviderId, fetch: F) -> Result<T, MarketDataError>
    where
        F: Future<Output = Result<T, MarketDataError>>,
    {
        let attempt = async {
            self.rate_limiter.acquire(provider_id).await;
            fetch.await
        };

        match tokio::time::timeout(self.provider_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(MarketDataError::Timeout {
                provider: provider_id.to_string(),
            }),
        }
    }

    fn record_failure(&self, provider_id: &ProviderId, error: &MarketDataError) {
        match error.retry_class() {
            RetryClass::FailoverWithPenalty | RetryClass::CircuitOpen => {
                self.circuit_breaker.record_failure(provider_id);
                warn!(
                    "Provider '{}' failed with {}, recorded circuit breaker failure",
                    provider_id, error
                );
            }
            RetryClass::NextProvider => {
                debug!(
                    "Provider '{}' failed with {}, trying next provider",
                    provider_id, error
                );
            }
        }
    }
}
