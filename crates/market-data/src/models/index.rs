use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Snapshot of one market index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub name: String,

    /// Index level (primary value)
    pub value: Option<Decimal>,

    pub change: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<Decimal>,

    pub last_updated: DateTime<Utc>,

    pub source: String,
}

impl IndexRecord {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            change: None,
            percent_change: None,
            last_updated: Utc::now(),
            source: source.into(),
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// An index the service tracks: provider symbol plus display name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedIndex {
    /// Provider symbol, e.g. `^NSEI`
    pub symbol: String,
    /// Display name used when the provider does not return one
    pub name: String,
}

impl TrackedIndex {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }
}

/// Major Indian indices tracked by default.
pub fn default_indices() -> Vec<TrackedIndex> {
    vec![
        TrackedIndex::new("^NSEI", "NIFTY 50"),
        TrackedIndex::new("^BSESN", "S&P BSE SENSEX"),
        TrackedIndex::new("^NSMIDCP", "NIFTY MIDCAP"),
        TrackedIndex::new("^CNXBANK", "NIFTY BANK"),
        TrackedIndex::new("^CNXIT", "NIFTY IT"),
    ]
}
