//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{IndexRecord, QuoteRecord, Symbol, TrackedIndex};

use super::capabilities::{ProviderCapabilities, RateLimit};

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// The registry treats every provider as a black box: it only looks at
/// whether the returned record carries its primary value.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use stockpulse_market_data::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             supports_quotes: true,
///             supports_indices: false,
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::default()
///     }
///
///     // ... implement fetch_quote
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO", "MONEYCONTROL", etc.
    /// Used for priority configuration, logging and circuit breaker tracking.
    fn id(&self) -> &'static str;

    /// Describes what this provider can do.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Rate limiting configuration.
    ///
    /// Returns the rate limits that should be applied when
    /// calling this provider.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    /// Fetch the latest quote for a normalized symbol.
    ///
    /// Must either return a record or fail; the registry bounds the call
    /// with its per-provider timeout, so implementations may assume they
    /// are cancelled when they take too long.
    async fn fetch_quote(&self, symbol: &Symbol) -> Result<QuoteRecord, MarketDataError>;

    /// Fetch snapshots for the tracked indices.
    ///
    /// Indices the provider cannot serve are omitted from the result.
    /// Default implementation returns `NotSupported`.
    async fn fetch_indices(
        &self,
        indices: &[TrackedIndex],
    ) -> Result<Vec<IndexRecord>, MarketDataError> {
        let _ = indices;
        Err(MarketDataError::NotSupported {
            operation: "indices".to_string(),
            provider: self.id().to_string(),
        })
    }
}
