//! Per-provider circuit breaker for fault tolerance.
//!
//! A provider that keeps timing out or rate limiting us is taken out of the
//! fallback chain for a while, so a quote request does not pay its full
//! timeout on every call. The circuit has three states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: Provider is failing, requests are skipped.
//! - **HalfOpen**: Recovery timeout elapsed, probe requests are allowed.
//!
//! State is in-memory and resets on process restart.

use std::time::Duration;

use dashmap::DashMap;
use log::{debug, info};
use serde::Serialize;
use tokio::time::Instant;

use crate::models::ProviderId;

/// Default number of consecutive failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time to wait before transitioning from Open to HalfOpen.
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Number of successful probes needed to close the circuit from HalfOpen.
const HALF_OPEN_SUCCESS_THRESHOLD: u32 = 2;

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are skipped.
    Open,
    /// Testing recovery - probe requests allowed.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait before probing an open provider again.
    pub recovery_timeout: Duration,
    /// Number of successes needed to close from HalfOpen.
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            half_open_success_threshold: HALF_OPEN_SUCCESS_THRESHOLD,
        }
    }
}

/// Snapshot of one provider's circuit, for status reporting.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitMetrics {
    pub provider: String,
    pub state: CircuitState,
    pub failure_count: u32,
}

/// Where one provider's circuit currently is, with the data that phase needs.
#[derive(Clone, Copy, Debug)]
enum Phase {
    Closed { failures: u32 },
    Open { since: Instant, failures: u32 },
    Probing { successes: u32, failures: u32 },
}

impl Phase {
    fn state(&self) -> CircuitState {
        match self {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::Probing { .. } => CircuitState::HalfOpen,
        }
    }

    fn failures(&self) -> u32 {
        match *self {
            Phase::Closed { failures }
            | Phase::Open { failures, .. }
            | Phase::Probing { failures, .. } => failures,
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Closed { failures: 0 }
    }
}

/// Per-provider circuit breaker.
///
/// Providers are tracked from the first time the registry asks about them.
pub struct CircuitBreaker {
    circuits: DashMap<String, Phase>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: DashMap::new(),
            config,
        }
    }

    /// Whether `provider` may be called now.
    ///
    /// An Open circuit whose recovery timeout has elapsed becomes HalfOpen
    /// and lets the call through as a probe.
    pub fn is_allowed(&self, provider: &ProviderId) -> bool {
        let mut phase = self.circuits.entry(provider.to_string()).or_default();

        match *phase {
            Phase::Closed { .. } | Phase::Probing { .. } => true,
            Phase::Open { since, failures } => {
                if since.elapsed() < self.config.recovery_timeout {
                    return false;
                }
                info!(
                    "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                    provider
                );
                *phase = Phase::Probing {
                    successes: 0,
                    failures,
                };
                true
            }
        }
    }

    /// Record a successful request for a provider.
    pub fn record_success(&self, provider: &ProviderId) {
        let mut phase = self.circuits.entry(provider.to_string()).or_default();

        *phase = match *phase {
            Phase::Closed { .. } => Phase::default(),
            Phase::Probing {
                successes,
                failures,
            } => {
                let successes = successes + 1;
                debug!(
                    "Circuit breaker: success for '{}' in HalfOpen ({}/{})",
                    provider, successes, self.config.half_open_success_threshold
                );
                if successes >= self.config.half_open_success_threshold {
                    info!("Circuit breaker: closing circuit for '{}'", provider);
                    Phase::default()
                } else {
                    Phase::Probing {
                        successes,
                        failures,
                    }
                }
            }
            // A call admitted before the circuit opened finished late.
            open @ Phase::Open { .. } => {
                debug!("Circuit breaker: late success for '{}' while Open", provider);
                open
            }
        };
    }

    /// Record a failed request for a provider.
    ///
    /// Any failure in HalfOpen reopens the circuit immediately.
    pub fn record_failure(&self, provider: &ProviderId) {
        let mut phase = self.circuits.entry(provider.to_string()).or_default();
        let now = Instant::now();
        let failures = phase.failures() + 1;

        *phase = match *phase {
            Phase::Closed { .. } if failures >= self.config.failure_threshold => {
                info!(
                    "Circuit breaker: opening circuit for '{}' after {} failures",
                    provider, failures
                );
                Phase::Open {
                    since: now,
                    failures,
                }
            }
            Phase::Closed { .. } => {
                debug!(
                    "Circuit breaker: failure for '{}' ({}/{})",
                    provider, failures, self.config.failure_threshold
                );
                Phase::Closed { failures }
            }
            Phase::Probing { .. } => {
                info!(
                    "Circuit breaker: reopening circuit for '{}' after failed probe",
                    provider
                );
                Phase::Open {
                    since: now,
                    failures,
                }
            }
            Phase::Open { .. } => Phase::Open {
                since: now,
                failures,
            },
        };
    }

    /// Get the current state for a provider.
    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        self.circuits
            .get(provider.as_ref())
            .map(|p| p.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Get the consecutive failure count for a provider.
    pub fn failure_count(&self, provider: &ProviderId) -> u32 {
        self.circuits
            .get(provider.as_ref())
            .map(|p| p.failures())
            .unwrap_or(0)
    }

    /// Circuit of every tracked provider, sorted by provider id.
    pub fn metrics(&self) -> Vec<CircuitMetrics> {
        let mut metrics: Vec<_> = self
            .circuits
            .iter()
            .map(|entry| CircuitMetrics {
                provider: entry.key().clone(),
                state: entry.value().state(),
                failure_count: entry.value().failures(),
            })
            .collect();
        metrics.sort_by(|a, b| a.provider.cmp(&b.provider));
        metrics
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
