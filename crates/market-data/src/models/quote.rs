use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Reason attached to a record when every provider was exhausted.
pub const NO_SOURCE_REASON: &str = "Could not retrieve stock data from available sources";

/// Reason attached to a batch position whose resolution failed outright.
pub const FETCH_FAILED_REASON: &str = "fetch failed";

/// Latest quote for one instrument.
///
/// Numeric fields are optional: `None` means the provider did not supply the
/// value and serializes as `null`, never as `0`. A record with `error_reason`
/// set is degraded: no provider produced usable data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRecord {
    pub symbol: String,

    pub company_name: String,

    /// Current price (primary value)
    pub price: Option<Decimal>,

    /// Absolute change against the previous close
    pub change: Option<Decimal>,

    /// Change against the previous close, in percent
    pub percent_change: Option<Decimal>,

    pub high: Option<Decimal>,

    pub low: Option<Decimal>,

    pub open: Option<Decimal>,

    pub volume: Option<Decimal>,

    /// When the record was produced (not when it was served from cache)
    pub last_updated: DateTime<Utc>,

    /// Provider that produced the record (YAHOO, MONEYCONTROL, ...)
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl QuoteRecord {
    /// Create an empty record for `symbol` produced by `source`.
    pub fn new(symbol: impl Into<String>, source: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            company_name: symbol.clone(),
            symbol,
            price: None,
            change: None,
            percent_change: None,
            high: None,
            low: None,
            open: None,
            volume: None,
            last_updated: Utc::now(),
            source: Some(source.into()),
            error_reason: None,
        }
    }

    /// Best-effort record returned when no provider produced usable data.
    pub fn degraded(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            company_name: symbol.clone(),
            symbol,
            price: None,
            change: None,
            percent_change: None,
            high: None,
            low: None,
            open: None,
            volume: None,
            last_updated: Utc::now(),
            source: None,
            error_reason: Some(reason.into()),
        }
    }

    /// Per-position placeholder for a batch entry that could not be resolved.
    pub fn failed(symbol: impl Into<String>) -> Self {
        Self::degraded(symbol, FETCH_FAILED_REASON)
    }

    pub fn is_degraded(&self) -> bool {
        self.error_reason.is_some()
    }

    /// Whether the primary value (price) is present.
    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_record_has_no_values() {
        let record = QuoteRecord::new("TCS", "YAHOO");
        assert_eq!(record.company_name, "TCS");
        assert_eq!(record.source.as_deref(), Some("YAHOO"));
        assert!(!record.has_price());
        assert!(!record.is_degraded());
    }

    #[test]
    fn test_degraded_record() {
        let record = QuoteRecord::degraded("ZZZZ", NO_SOURCE_REASON);
        assert!(record.is_degraded());
        assert!(record.price.is_none());
        assert!(record.source.is_none());
        assert_eq!(record.company_name, "ZZZZ");
    }

    #[test]
    fn test_absent_values_serialize_as_null() {
        let mut record = QuoteRecord::new("INFY", "YAHOO");
        record.price = Some(dec!(1520.5));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["price"], serde_json::json!(1520.5));
        assert!(json["change"].is_null());
        assert!(json["volume"].is_null());
        assert_eq!(json["companyName"], "INFY");
        assert!(json.get("errorReason").is_none());
    }

    #[test]
    fn test_failed_record_serializes_reason() {
        let json = serde_json::to_value(QuoteRecord::failed("HDFC")).unwrap();
        assert_eq!(json["errorReason"], FETCH_FAILED_REASON);
        assert_eq!(json["symbol"], "HDFC");
    }
}
