//! Multi-symbol fan-out with bounded concurrency.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use log::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::QuoteRecord;

/// Resolves a list of symbols through a single-symbol path.
///
/// Results come back in input order, one per input (duplicates included).
/// A position whose resolution fails or panics becomes
/// [`QuoteRecord::failed`]; the batch itself never fails.
#[derive(Clone, Debug)]
pub struct BatchOrchestrator {
    concurrency: usize,
}

impl BatchOrchestrator {
    /// `concurrency` is clamped to at least one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Resolve every symbol with `resolve`, at most `concurrency` at a time.
    pub async fn fetch_many<S, F, Fut>(&self, symbols: &[S], resolve: F) -> Vec<QuoteRecord>
    where
        S: AsRef<str>,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<QuoteRecord, MarketDataError>>,
    {
        debug!(
            "Batch: resolving {} symbols, {} at a time",
            symbols.len(),
            self.concurrency
        );

        // Owned up front so the returned future does not borrow `symbols`
        // through a closure, which would keep it from being `Send`.
        let owned: Vec<String> = symbols.iter().map(|raw| raw.as_ref().to_string()).collect();

        stream::iter(owned)
            .map(|raw| {
                let fetch = AssertUnwindSafe(resolve(raw.clone())).catch_unwind();
                async move {
                    match fetch.await {
                        Ok(Ok(record)) => record,
                        Ok(Err(e)) => {
                            warn!("Batch: resolving {:?} failed: {}", raw, e);
                            QuoteRecord::failed(raw.trim().to_uppercase())
                        }
                        Err(_) => {
                            warn!("Batch: resolving {:?} panicked", raw);
                            QuoteRecord::failed(raw.trim().to_uppercase())
                        }
                    }
                }
            })
            // `buffered` keeps input order while capping in-flight futures
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FETCH_FAILED_REASON;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn priced(symbol: &str, price: i64) -> QuoteRecord {
        let mut record = QuoteRecord::new(symbol, "TEST");
        record.price = Some(Decimal::from(price));
        record
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_preserved_with_uneven_latency() {
        let batch = BatchOrchestrator::new(3);
        let symbols = ["A", "B", "A", "C"];

        let records = batch
            .fetch_many(&symbols, |raw| async move {
                // Later positions finish first
                let delay = match raw.as_str() {
                    "A" => 300,
                    "B" => 200,
                    _ => 100,
                };
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(priced(&raw, delay as i64))
            })
            .await;

        let order: Vec<_> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "A", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let batch = BatchOrchestrator::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let symbols: Vec<String> = (0..7).map(|i| format!("S{}", i)).collect();

        let records = batch
            .fetch_many(&symbols, |raw| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(priced(&raw, 1))
                }
            })
            .await;

        assert_eq!(records.len(), 7);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_per_position() {
        let batch = BatchOrchestrator::new(5);
        let symbols = ["good", "bad", "boom", "fine"];

        let records = batch
            .fetch_many(&symbols, |raw| async move {
                match raw.as_str() {
                    "bad" => Err(MarketDataError::InvalidSymbol(raw)),
                    "boom" => panic!("provider exploded"),
                    _ => Ok(priced(&raw.to_uppercase(), 10)),
                }
            })
            .await;

        assert_eq!(records.len(), 4);
        assert!(records[0].has_price());
        assert_eq!(records[1].symbol, "BAD");
        assert_eq!(records[1].error_reason.as_deref(), Some(FETCH_FAILED_REASON));
        assert_eq!(records[2].error_reason.as_deref(), Some(FETCH_FAILED_REASON));
        assert!(records[3].has_price());
    }

    #[tokio::test]
    async fn test_empty_input() {
        let batch = BatchOrchestrator::new(5);
        let symbols: [&str; 0] = [];
        let records = batch
            .fetch_many(&symbols, |raw| async move { Ok(priced(&raw, 1)) })
            .await;
        assert!(records.is_empty());
    }
}
