//! Market index snapshots through the shared cache and fallback machinery.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::cache::{RequestCoalescer, TtlCache};
use crate::errors::MarketDataError;
use crate::models::{IndexRecord, TrackedIndex};
use crate::registry::ProviderRegistry;

/// Cache and coalescing key shared by every index request.
pub const INDICES_CACHE_KEY: &str = "market_indices";

/// Fetches the configured set of indices as one unit.
///
/// All indices share a single cache entry. Empty results are never cached,
/// so a failed refresh is retried on the next call.
pub struct IndexAggregator {
    registry: Arc<ProviderRegistry>,
    cache: Arc<TtlCache<String, Vec<IndexRecord>>>,
    coalescer: RequestCoalescer<String, Vec<IndexRecord>>,
    tracked: Arc<[TrackedIndex]>,
    ttl: Duration,
}

impl IndexAggregator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        cache: Arc<TtlCache<String, Vec<IndexRecord>>>,
        tracked: Vec<TrackedIndex>,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            cache,
            coalescer: RequestCoalescer::new(),
            tracked: tracked.into(),
            ttl,
        }
    }

    pub fn tracked(&self) -> &[TrackedIndex] {
        &self.tracked
    }

    /// Current snapshots of the tracked indices.
    ///
    /// Returns [`MarketDataError::IndicesUnavailable`] (possibly wrapped in
    /// [`MarketDataError::Shared`]) when no provider produced any index.
    pub async fn fetch_indices(&self) -> Result<Vec<IndexRecord>, MarketDataError> {
        if let Some(records) = self.cache.get(INDICES_CACHE_KEY) {
            debug!("Indices served from cache");
            return Ok(records);
        }

        if self.tracked.is_empty() {
            return Ok(Vec::new());
        }

        let registry = Arc::clone(&self.registry);
        let cache = Arc::clone(&self.cache);
        let tracked = Arc::clone(&self.tracked);
        let ttl = self.ttl;

        self.coalescer
            .resolve(INDICES_CACHE_KEY.to_string(), move || async move {
                let (records, tier) = registry.fetch_indices(&tracked).await?;
                info!("Caching {} indices ({}) for {:?}", records.len(), tier, ttl);
                cache.set(INDICES_CACHE_KEY.to_string(), records.clone(), ttl);
                Ok(records)
            })
            .await
    }
}
