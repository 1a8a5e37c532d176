//! Skip reason tracking for provider selection diagnostics.

use std::fmt;

use crate::models::ProviderId;

/// Why a provider was not called during a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Provider doesn't implement the requested operation.
    OperationNotSupported,

    /// Circuit breaker is open for this provider.
    CircuitBreakerOpen,
}

/// Result of one provider step in the fallback chain.
#[derive(Clone, Debug)]
pub enum AttemptOutcome {
    Skipped(SkipReason),
    Failed(String),
    Success,
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub outcome: AttemptOutcome,
}

/// Every provider step taken for one fetch, in order.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.push(provider_id, AttemptOutcome::Skipped(reason));
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: impl fmt::Display) {
        self.push(provider_id, AttemptOutcome::Failed(error.to_string()));
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.push(provider_id, AttemptOutcome::Success);
    }

    fn push(&mut self, provider_id: ProviderId, outcome: AttemptOutcome) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success => format!("{}: SUCCESS", a.provider_id),
                AttemptOutcome::Skipped(reason) => {
                    format!("{}: SKIPPED ({:?})", a.provider_id, reason)
                }
                AttemptOutcome::Failed(err) => format!("{}: ERROR ({})", a.provider_id, err),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Check if any provider succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.outcome, AttemptOutcome::Success))
    }

    /// Providers that were actually called, successful or not.
    pub fn called(&self) -> Vec<&ProviderId> {
        self.attempts
            .iter()
            .filter(|a| !matches!(a.outcome, AttemptOutcome::Skipped(_)))
            .map(|a| &a.provider_id)
            .collect()
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| match &a.outcome {
                AttemptOutcome::Failed(err) => Some((&a.provider_id, err.as_str())),
                _ => None,
            })
            .collect()
    }
}
