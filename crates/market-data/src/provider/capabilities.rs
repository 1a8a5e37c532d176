//! Provider capabilities and rate limiting configuration.
//!
//! This module defines structures for describing what a market data provider
//! can do and how it should be rate-limited.

/// Describes the capabilities of a market data provider.
///
/// Used by the registry to decide which providers take part in a quote
/// chain and which in an index chain.
#[derive(Clone, Debug)]
pub struct ProviderCapabilities {
    /// Whether the provider can fetch a single-instrument quote.
    pub supports_quotes: bool,

    /// Whether the provider can fetch market index snapshots.
    pub supports_indices: bool,
}

/// Rate limiting configuration for a provider.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Debug)]
pub struct RateLimit {
    /// Maximum requests allowed per minute.
    pub requests_per_minute: u32,

    /// Maximum burst of requests allowed at once.
    pub max_concurrency: usize,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            max_concurrency: 5,
        }
    }
}

