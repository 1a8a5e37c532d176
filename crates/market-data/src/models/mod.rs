//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Type aliases for common identifiers (ProviderId)
//! - `symbol` - Normalized instrument key (Symbol)
//! - `quote` - Quote record returned to callers (QuoteRecord)
//! - `index` - Market index snapshot and index configuration (IndexRecord, TrackedIndex)

mod index;
mod quote;
mod symbol;
mod types;

pub use index::{default_indices, IndexRecord, TrackedIndex};
pub use quote::{QuoteRecord, FETCH_FAILED_REASON, NO_SOURCE_REASON};
pub use symbol::Symbol;
pub use types::ProviderId;
