//! Provider registry module.
//!
//! This module provides orchestration for market data providers, including:
//! - Priority ordering and fallback across providers
//! - Per-provider timeouts
//! - Rate limiting per provider
//! - Circuit breaking for fault tolerance
//! - Quote data validation

mod circuit_breaker;
mod rate_limiter;
mod registry;
mod skip_reason;
mod validator;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use registry::{FetchOutcome, ProviderRegistry, ProviderTier, DEFAULT_PROVIDER_TIMEOUT};
pub use skip_reason::{AttemptOutcome, FetchDiagnostics, ProviderAttempt, SkipReason};
pub use validator::{QuoteValidator, ValidationSeverity, ValidatorConfig};
