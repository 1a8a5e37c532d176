//! StockPulse Market Data Crate
//!
//! This crate answers "what is the current price of stock X" on top of
//! unreliable, rate-limited upstream sources.
//!
//! # Overview
//!
//! The market data crate provides:
//! - A TTL cache keyed by normalized symbol
//! - Request coalescing, so concurrent lookups for one symbol share one fetch
//! - An ordered provider fallback chain with per-provider timeouts
//! - Bounded-concurrency batch lookups that preserve input order
//! - Market index snapshots through the same machinery
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! | MarketDataService|  (get_quote / get_quotes / get_indices)
//! +------------------+
//!          |
//!          v
//! +------------------+     hit
//! |    TtlCache      | ----------> record
//! +------------------+
//!          | miss
//!          v
//! +------------------+
//! | RequestCoalescer |  (one fetch in flight per symbol)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! | ProviderRegistry |  (priority order, timeout, circuit breaker)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |    Provider      |  (Yahoo, MoneyControl, ...)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`Symbol`] - Normalized (trimmed, uppercase) instrument key
//! - [`QuoteRecord`] - Latest quote; degraded when `error_reason` is set
//! - [`IndexRecord`] - Market index snapshot
//! - [`MarketDataConfig`] - TTLs, timeouts, concurrency and provider priority
//!
//! # Example
//!
//! ```no_run
//! use stockpulse_market_data::{MarketDataConfig, MarketDataService};
//!
//! # async fn run() -> Result<(), stockpulse_market_data::MarketDataError> {
//! let service = MarketDataService::new(MarketDataConfig::default())?;
//! let quote = service.get_quote("reliance").await;
//! println!("{} {:?}", quote.symbol, quote.price);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod errors;
pub mod indices;
pub mod models;
pub mod provider;
pub mod registry;
pub mod service;

// Re-export all public types from models
pub use models::{
    default_indices, IndexRecord, ProviderId, QuoteRecord, Symbol, TrackedIndex,
    FETCH_FAILED_REASON, NO_SOURCE_REASON,
};

pub use batch::BatchOrchestrator;
pub use cache::{RequestCoalescer, TtlCache};
pub use config::MarketDataConfig;
pub use errors::{MarketDataError, RetryClass};
pub use indices::{IndexAggregator, INDICES_CACHE_KEY};
pub use service::{MarketDataService, ServiceSnapshot};

// Re-export provider types
pub use provider::moneycontrol::MoneyControlProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

// Re-export registry types
pub use registry::{
    CircuitBreaker, CircuitState, FetchDiagnostics, FetchOutcome, ProviderAttempt,
    ProviderRegistry, ProviderTier, QuoteValidator, RateLimitConfig, RateLimiter, SkipReason,
};
