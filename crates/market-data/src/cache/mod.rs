//! Caching layer for market data
//!
//! Provides:
//! - TTL Cache: in-memory cache where every entry carries its own expiry
//! - Request Coalescer: at most one upstream fetch in flight per key

mod coalescer;
mod ttl_cache;

pub use coalescer::RequestCoalescer;
pub use ttl_cache::TtlCache;
