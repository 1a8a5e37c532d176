//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Provider capabilities and rate limiting configuration
//! - Concrete provider implementations (Yahoo, MoneyControl)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The registry only inspects field presence on returned records
//! - **Extensible**: New providers can be added by implementing `MarketDataProvider`
//! - **Resilient**: Timeouts, rate limiting and circuit breakers protect against provider failures

mod capabilities;
mod http;
mod traits;

pub mod moneycontrol;
pub mod yahoo;

// Re-exports
pub use capabilities::{ProviderCapabilities, RateLimit};
pub use http::build_http_client;
pub use traits::MarketDataProvider;
