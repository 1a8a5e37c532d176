use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::MarketDataError;

/// Normalized instrument key.
///
/// Trimmed and uppercased, so `" reliance "` and `"RELIANCE"` share one cache
/// entry and one in-flight fetch. Cloning is cheap.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Normalize a caller-supplied symbol.
    ///
    /// Returns [`MarketDataError::InvalidSymbol`] when nothing is left after trimming.
    pub fn parse(raw: &str) -> Result<Self, MarketDataError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MarketDataError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(Arc::from(trimmed.to_uppercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
