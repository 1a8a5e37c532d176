//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining failover behavior

mod retry;

pub use retry::RetryClass;

use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Provider-level variants are classified into a [`RetryClass`] via
/// [`retry_class`](Self::retry_class), which tells the provider registry
/// whether the failure should count against the provider's circuit.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The caller supplied a symbol that is empty after trimming.
    #[error("Invalid symbol: {0:?}")]
    InvalidSymbol(String),

    /// The requested symbol was not found by the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider did not finish within the per-provider timeout.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The circuit breaker is open for this provider.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// The provider returned a record that is not usable (e.g. no price).
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// The provider does not implement the requested operation.
    #[error("Operation {operation} not supported by {provider}")]
    NotSupported {
        /// The operation that was requested
        operation: String,
        /// The provider that rejected it
        provider: String,
    },

    /// No provider produced any usable index and nothing is cached.
    #[error("Failed to get market indices")]
    IndicesUnavailable,

    /// A coalesced fetch task panicked or was aborted.
    #[error("Fetch task failed: {0}")]
    TaskFailed(String),

    /// A failure shared by every caller attached to the same coalesced fetch.
    #[error("{0}")]
    Shared(Arc<MarketDataError>),

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the failover classification for this error.
    ///
    /// - [`RetryClass::FailoverWithPenalty`]: transient, count against the circuit
    /// - [`RetryClass::NextProvider`]: try the next provider, no penalty
    /// - [`RetryClass::CircuitOpen`]: provider circuit is open, skip it
    ///
    /// # Examples
    ///
    /// ```
    /// use stockpulse_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::FailoverWithPenalty);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_) => {
                RetryClass::FailoverWithPenalty
            }

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            Self::Shared(inner) => inner.retry_class(),

            Self::InvalidSymbol(_)
            | Self::SymbolNotFound(_)
            | Self::ProviderError { .. }
            | Self::ValidationFailed { .. }
            | Self::NotSupported { .. }
            | Self::IndicesUnavailable
            | Self::TaskFailed(_) => RetryClass::NextProvider,
        }
    }

    /// The underlying error, looking through any [`Shared`](Self::Shared) wrappers.
    ///
    /// Callers of a coalesced fetch receive the producer's error wrapped in
    /// `Shared`; match on `root()` to inspect the original variant.
    pub fn root(&self) -> &MarketDataError {
        match self {
            Self::Shared(inner) => inner.root(),
            other => other,
        }
    }
}
