//! Facade tying cache, coalescer, fallback chain and batching together.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::batch::BatchOrchestrator;
use crate::cache::{RequestCoalescer, TtlCache};
use crate::config::MarketDataConfig;
use crate::errors::MarketDataError;
use crate::indices::IndexAggregator;
use crate::models::{IndexRecord, QuoteRecord, Symbol};
use crate::provider::{
    build_http_client, moneycontrol::MoneyControlProvider, yahoo::YahooProvider,
    MarketDataProvider,
};
use crate::registry::{CircuitMetrics, ProviderRegistry};

/// Point-in-time view of the service internals, for status endpoints.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub providers: Vec<&'static str>,
    pub cached_quotes: usize,
    pub quotes_in_flight: usize,
    pub circuits: Vec<CircuitMetrics>,
}

/// Latest quotes and index snapshots for callers.
///
/// Reads go to the cache first; misses go through the coalescer to the
/// provider fallback chain, whose result is cached with a TTL that depends
/// on which provider produced it.
pub struct MarketDataService {
    config: Arc<MarketDataConfig>,
    registry: Arc<ProviderRegistry>,
    quotes: Arc<TtlCache<Symbol, QuoteRecord>>,
    coalescer: RequestCoalescer<Symbol, QuoteRecord>,
    batch: BatchOrchestrator,
    indices: IndexAggregator,
    index_cache: Arc<TtlCache<String, Vec<IndexRecord>>>,
}

impl MarketDataService {
    /// Build a service with the bundled Yahoo and MoneyControl providers.
    pub fn new(config: MarketDataConfig) -> Result<Self, MarketDataError> {
        let client = build_http_client(config.provider_timeout)?;
        let providers: Vec<Arc<dyn MarketDataProvider>> = vec![
            Arc::new(YahooProvider::new(client.clone())),
            Arc::new(MoneyControlProvider::new(client)),
        ];
        Ok(Self::with_providers(config, providers))
    }

    /// Build a service over an arbitrary provider set.
    ///
    /// Providers are ordered by `config.provider_priority`; providers not
    /// listed there are never consulted.
    pub fn with_providers(
        config: MarketDataConfig,
        providers: Vec<Arc<dyn MarketDataProvider>>,
    ) -> Self {
        let registry = Arc::new(ProviderRegistry::with_priority(
            providers,
            &config.provider_priority,
            config.provider_timeout,
        ));
        info!("Market data providers in order: {:?}", registry.provider_ids());

        let index_cache = Arc::new(TtlCache::new());
        let indices = IndexAggregator::new(
            Arc::clone(&registry),
            Arc::clone(&index_cache),
            config.indices.clone(),
            config.cache_ttl,
        );

        Self {
            batch: BatchOrchestrator::new(config.batch_limit()),
            registry,
            quotes: Arc::new(TtlCache::new()),
            coalescer: RequestCoalescer::new(),
            indices,
            index_cache,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }

    /// Start background purging of expired cache entries.
    ///
    /// Must be called from within a tokio runtime. The sweepers stop on
    /// their own once the service is dropped.
    pub fn spawn_sweepers(&self) {
        let interval = self.config.sweep_interval();
        debug!("Starting cache sweepers every {:?}", interval);
        self.quotes.spawn_sweeper(interval);
        self.index_cache.spawn_sweeper(interval);
    }

    /// Latest quote for `symbol`. Never fails.
    ///
    /// A blank symbol, or a fetch whose task died, yields a record carrying
    /// `errorReason` instead of an error.
    pub async fn get_quote(&self, symbol: &str) -> QuoteRecord {
        match self.resolve(symbol.to_string()).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Quote for {:?} failed: {}", symbol, e);
                let symbol = symbol.trim().to_uppercase();
                match e.root() {
                    MarketDataError::InvalidSymbol(_) => {
                        QuoteRecord::degraded(symbol, e.to_string())
                    }
                    _ => QuoteRecord::failed(symbol),
                }
            }
        }
    }

    /// Latest quotes for `symbols`, in input order.
    pub async fn get_quotes<S: AsRef<str>>(&self, symbols: &[S]) -> Vec<QuoteRecord> {
        self.batch
            .fetch_many(symbols, |raw| self.resolve(raw))
            .await
    }

    /// Snapshots of the configured indices.
    pub async fn get_indices(&self) -> Result<Vec<IndexRecord>, MarketDataError> {
        self.indices.fetch_indices().await
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            providers: self.registry.provider_ids(),
            cached_quotes: self.quotes.len(),
            quotes_in_flight: self.coalescer.in_flight(),
            circuits: self.registry.circuit_metrics(),
        }
    }

    /// Cached, coalesced single-symbol path shared by `get_quote` and `get_quotes`.
    async fn resolve(&self, raw: String) -> Result<QuoteRecord, MarketDataError> {
        let symbol = Symbol::parse(&raw)?;

        if let Some(record) = self.quotes.get(&symbol) {
            debug!("Quote for {} served from cache", symbol);
            return Ok(record);
        }

        let registry = Arc::clone(&self.registry);
        let cache = Arc::clone(&self.quotes);
        let config = Arc::clone(&self.config);
        let key = symbol.clone();

        self.coalescer
            .resolve(symbol, move || async move {
                let outcome = registry.fetch_quote(&key).await;

                match config.ttl_for(outcome.tier) {
                    Some(ttl) => {
                        debug!("Caching {} ({}) for {:?}", key, outcome.tier, ttl);
                        cache.set(key, outcome.record.clone(), ttl);
                    }
                    None => debug!("Not caching {} ({})", key, outcome.tier),
                }

                Ok(outcome.record)
            })
            .await
    }
}
