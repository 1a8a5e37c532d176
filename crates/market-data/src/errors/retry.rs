/// Classification for failover policy.
///
/// Used to determine how the registry should respond to errors from providers.
/// No class stops the chain: every provider failure is recovered by moving on
/// to the next provider.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Record Circuit Breaker Failure? |
/// |-------|-------------------|--------------------------------|
/// | `FailoverWithPenalty` | Yes | Yes (affects future requests) |
/// | `NextProvider` | Yes | No |
/// | `CircuitOpen` | Yes (skip this one) | Yes (keeps the circuit open) |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Failover to next provider and record a circuit breaker penalty.
    ///
    /// Used for transient errors like rate limiting (429) or timeout.
    /// The failure is recorded in the circuit breaker, which may cause
    /// this provider to be skipped in future requests if failures accumulate.
    FailoverWithPenalty,

    /// Try next provider without recording any penalty.
    ///
    /// Used when this provider can't handle the request (unknown symbol,
    /// unparseable page, missing price) but another provider might succeed.
    NextProvider,

    /// The provider reported its own upstream circuit as open.
    /// Skip this provider and count it against the local breaker.
    CircuitOpen,
}
