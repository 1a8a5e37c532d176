//! Collapses concurrent fetches for the same key into one upstream call.
//!
//! The first caller for a key registers a pending handle and starts the fetch
//! on its own task. Later callers attach to the handle and receive a clone of
//! the same result. The task unregisters the handle when it settles, so the
//! next caller after that starts a fresh fetch.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};

use crate::errors::MarketDataError;

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, Arc<MarketDataError>>>>;
type InFlight<K, V> = Arc<Mutex<HashMap<K, SharedResult<V>>>>;

fn lock_in_flight<K, V>(
    in_flight: &Mutex<HashMap<K, SharedResult<V>>>,
) -> MutexGuard<'_, HashMap<K, SharedResult<V>>> {
    in_flight.lock().unwrap_or_else(|poisoned| {
        warn!("Coalescer mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Removes the key once the fetch task ends, including by panic.
struct Unregister<K, V>
where
    K: Eq + Hash,
{
    in_flight: InFlight<K, V>,
    key: Option<K>,
}

impl<K, V> Drop for Unregister<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            lock_in_flight(&self.in_flight).remove(&key);
        }
    }
}

/// Per-key singleflight.
pub struct RequestCoalescer<K, V> {
    in_flight: InFlight<K, V>,
}

impl<K, V> RequestCoalescer<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve `key`, calling `produce` only if no fetch for it is pending.
    ///
    /// `produce` runs on a spawned task, so it completes (and whatever it
    /// caches stays cached) even if every caller stops waiting. Its error, or
    /// a panic surfaced as [`MarketDataError::TaskFailed`], reaches every
    /// attached caller wrapped in [`MarketDataError::Shared`].
    pub async fn resolve<F, Fut>(&self, key: K, produce: F) -> Result<V, MarketDataError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, MarketDataError>> + Send + 'static,
    {
        let pending = {
            let mut in_flight = lock_in_flight(&self.in_flight);

            if let Some(pending) = in_flight.get(&key) {
                debug!("Coalescer: attaching to pending fetch for {:?}", key);
                pending.clone()
            } else {
                debug!("Coalescer: starting fetch for {:?}", key);
                // A panicking `produce` must not leave a guard that relocks
                // this mutex while unwinding.
                let fetch = produce();
                let guard = Unregister {
                    in_flight: Arc::clone(&self.in_flight),
                    key: Some(key.clone()),
                };

                let task = tokio::spawn(async move {
                    // Unregisters after the result (and its side effects) exist.
                    let _guard = guard;
                    fetch.await.map_err(Arc::new)
                });

                let pending = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(join_error) => {
                            warn!("Coalesced fetch task failed: {}", join_error);
                            Err(Arc::new(MarketDataError::TaskFailed(join_error.to_string())))
                        }
                    }
                }
                .boxed()
                .shared();

                // The task's unregister blocks on this lock, so the insert
                // always happens before the removal.
                in_flight.insert(key, pending.clone());
                pending
            }
        };

        pending.await.map_err(MarketDataError::Shared)
    }

    /// Number of keys with a fetch in flight.
    pub fn in_flight(&self) -> usize {
        lock_in_flight(&self.in_flight).len()
    }

    /// Whether a fetch for `key` is in flight.
    pub fn is_pending(&self, key: &K) -> bool {
        lock_in_flight(&self.in_flight).contains_key(key)
    }
}

impl<K, V> Default for RequestCoalescer<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
