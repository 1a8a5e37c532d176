//! Yahoo Finance market data provider.
//!
//! Uses the public v8 chart endpoint to fetch:
//! - NSE/BSE equities (e.g., RELIANCE -> RELIANCE.NS, INFY.BO)
//! - Market indices (e.g., ^NSEI, ^BSESN)

mod models;

use async_trait::async_trait;
use futures::future::join_all;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{IndexRecord, QuoteRecord, Symbol, TrackedIndex};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

use models::{YahooChartResponse, YahooChartResult, YahooQuoteSeries};

pub const YAHOO_PROVIDER_ID: &str = "YAHOO";

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Suffix Yahoo uses for National Stock Exchange of India listings.
const NSE_SUFFIX: &str = ".NS";

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider using the given HTTP client.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Create a provider that talks to a different host (mirrors, tests).
    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Map a normalized symbol to Yahoo's ticker format.
    ///
    /// Bare tickers are assumed to be NSE listings. Tickers that already carry
    /// an exchange suffix, and index symbols (`^...`), pass through unchanged.
    fn provider_symbol(symbol: &str) -> String {
        if symbol.contains('.') || symbol.starts_with('^') {
            symbol.to_string()
        } else {
            format!("{}{}", symbol, NSE_SUFFIX)
        }
    }

    async fn fetch_chart(&self, yahoo_symbol: &str) -> Result<YahooChartResult, MarketDataError> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d",
            self.base_url,
            encode(yahoo_symbol)
        );

        debug!("Fetching Yahoo chart for {}", yahoo_symbol);

        let response = self.client.get(&url).send().await?;

        match response.status() {
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                return Err(MarketDataError::RateLimited {
                    provider: YAHOO_PROVIDER_ID.to_string(),
                })
            }
            reqwest::StatusCode::NOT_FOUND => {
                return Err(MarketDataError::SymbolNotFound(yahoo_symbol.to_string()))
            }
            status if !status.is_success() => {
                return Err(MarketDataError::ProviderError {
                    provider: YAHOO_PROVIDER_ID.to_string(),
                    message: format!("Chart request returned {}", status),
                })
            }
            _ => {}
        }

        let data: YahooChartResponse =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::ProviderError {
                    provider: YAHOO_PROVIDER_ID.to_string(),
                    message: format!("Failed to parse chart response: {}", e),
                })?;

        first_result(data, yahoo_symbol)
    }
}

/// Pull the first chart result out of a response, mapping API errors.
fn first_result(
    data: YahooChartResponse,
    yahoo_symbol: &str,
) -> Result<YahooChartResult, MarketDataError> {
    if let Some(error) = data.chart.error {
        warn!(
            "Yahoo chart error for {}: {:?} {:?}",
            yahoo_symbol, error.code, error.description
        );
        return Err(MarketDataError::SymbolNotFound(yahoo_symbol.to_string()));
    }

    data.chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| MarketDataError::SymbolNotFound(yahoo_symbol.to_string()))
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}

/// Absolute and percent change of `price` against `previous`.
fn change_from_previous(
    price: Option<Decimal>,
    previous: Option<Decimal>,
) -> (Option<Decimal>, Option<Decimal>) {
    match (price, previous) {
        (Some(price), Some(previous)) if !previous.is_zero() => {
            let change = price - previous;
            let percent = (change / previous * Decimal::ONE_HUNDRED).round_dp(2);
            (Some(change), Some(percent))
        }
        _ => (None, None),
    }
}

fn chart_to_quote(symbol: &Symbol, result: &YahooChartResult) -> QuoteRecord {
    let meta = &result.meta;
    let price = to_decimal(meta.regular_market_price);
    let previous = to_decimal(meta.previous_close.or(meta.chart_previous_close));
    let (change, percent_change) = change_from_previous(price, previous);

    let series = result
        .indicators
        .as_ref()
        .and_then(|i| i.quote.first());

    let company_name = meta
        .long_name
        .clone()
        .or_else(|| meta.short_name.clone())
        .or_else(|| {
            meta.symbol
                .as_deref()
                .map(|s| s.trim_end_matches(NSE_SUFFIX).to_string())
        })
        .unwrap_or_else(|| symbol.to_string());

    let mut record = QuoteRecord::new(symbol.as_str(), YAHOO_PROVIDER_ID);
    record.company_name = company_name;
    record.price = price;
    record.change = change;
    record.percent_change = percent_change;
    record.high = series.and_then(|s| to_decimal(YahooQuoteSeries::latest(&s.high)));
    record.low = series.and_then(|s| to_decimal(YahooQuoteSeries::latest(&s.low)));
    record.open = series.and_then(|s| to_decimal(YahooQuoteSeries::latest(&s.open)));
    record.volume = series.and_then(|s| to_decimal(YahooQuoteSeries::latest(&s.volume)));
    record
}

fn chart_to_index(index: &TrackedIndex, result: &YahooChartResult) -> IndexRecord {
    let meta = &result.meta;
    let value = to_decimal(meta.regular_market_price);
    let previous = to_decimal(meta.previous_close.or(meta.chart_previous_close));
    let (change, percent_change) = change_from_previous(value, previous);

    let mut record = IndexRecord::new(
        meta.short_name.clone().unwrap_or_else(|| index.name.clone()),
        YAHOO_PROVIDER_ID,
    );
    record.value = value;
    record.change = change;
    record.percent_change = percent_change;
    record
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        YAHOO_PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_quotes: true,
            supports_indices: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 2000,
            max_concurrency: 10,
        }
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<QuoteRecord, MarketDataError> {
        let yahoo_symbol = Self::provider_symbol(symbol.as_str());
        let result = self.fetch_chart(&yahoo_symbol).await?;
        Ok(chart_to_quote(symbol, &result))
    }

    async fn fetch_indices(
        &self,
        indices: &[TrackedIndex],
    ) -> Result<Vec<IndexRecord>, MarketDataError> {
        let futures = indices.iter().map(|index| async move {
            match self.fetch_chart(&index.symbol).await {
                Ok(result) => Some(chart_to_index(index, &result)),
                Err(e) => {
                    warn!("Error fetching index {}: {}", index.symbol, e);
                    None
                }
            }
        });

        let results = join_all(futures).await;
        Ok(results.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use rust_decimal_macros::dec;

    const RELIANCE_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "RELIANCE.NS",
                    "regularMarketPrice": 2950.5,
                    "previousClose": 2900.0,
                    "regularMarketTime": 1717410600
                },
                "timestamp": [1717386300, 1717410600],
                "indicators": {
                    "quote": [{
                        "open": [2910.0, 2915.0],
                        "high": [2960.0, 2962.0],
                        "low": [2905.0, 2908.0],
                        "close": [2940.0, 2950.5],
                        "volume": [120000, 340000]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    fn parse(json: &str) -> YahooChartResult {
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        first_result(response, "TEST").unwrap()
    }

    #[test]
    fn test_provider_symbol_defaults_to_nse() {
        assert_eq!(YahooProvider::provider_symbol("RELIANCE"), "RELIANCE.NS");
        assert_eq!(YahooProvider::provider_symbol("INFY.BO"), "INFY.BO");
        assert_eq!(YahooProvider::provider_symbol("^NSEI"), "^NSEI");
    }

    #[test]
    fn test_chart_to_quote() {
        let symbol = Symbol::parse("reliance").unwrap();
        let produced_at = Utc::now();
        let quote = chart_to_quote(&symbol, &parse(RELIANCE_CHART));

        assert_eq!(quote.symbol, "RELIANCE");
        assert_eq!(quote.company_name, "RELIANCE");
        assert_eq!(quote.price, Some(dec!(2950.5)));
        assert_eq!(quote.change, Some(dec!(50.5)));
        assert_eq!(quote.percent_change, Some(dec!(1.74)));
        assert_eq!(quote.open, Some(dec!(2915)));
        assert_eq!(quote.high, Some(dec!(2962)));
        assert_eq!(quote.low, Some(dec!(2908)));
        assert_eq!(quote.volume, Some(dec!(340000)));
        assert_eq!(quote.source.as_deref(), Some(YAHOO_PROVIDER_ID));
        // Production time, not the exchange's last trade time
        assert!(quote.last_updated >= produced_at);
        assert!(!quote.is_degraded());
    }

    #[test]
    fn test_missing_price_is_left_absent() {
        let json = r#"{"chart":{"result":[{"meta":{"symbol":"ABC.NS","previousClose":10.0}}]}}"#;
        let symbol = Symbol::parse("ABC").unwrap();
        let quote = chart_to_quote(&symbol, &parse(json));

        assert!(quote.price.is_none());
        assert!(quote.change.is_none());
        assert!(quote.high.is_none());
    }

    #[test]
    fn test_zero_change_is_not_dropped() {
        let json = r#"{"chart":{"result":[{"meta":{"regularMarketPrice":10.0,"previousClose":10.0}}]}}"#;
        let symbol = Symbol::parse("FLAT").unwrap();
        let quote = chart_to_quote(&symbol, &parse(json));

        assert_eq!(quote.change, Some(Decimal::ZERO));
        assert_eq!(quote.percent_change, Some(Decimal::ZERO));
        assert_eq!(quote.company_name, "FLAT");
    }

    #[test]
    fn test_chart_to_index_uses_configured_name() {
        let json = r#"{"chart":{"result":[{"meta":{"symbol":"^NSEI","regularMarketPrice":22000.0,"chartPreviousClose":22100.0}}]}}"#;
        let index = TrackedIndex::new("^NSEI", "NIFTY 50");
        let record = chart_to_index(&index, &parse(json));

        assert_eq!(record.name, "NIFTY 50");
        assert_eq!(record.value, Some(dec!(22000)));
        assert_eq!(record.change, Some(dec!(-100)));
        assert_eq!(record.percent_change, Some(dec!(-0.45)));
    }

    #[test]
    fn test_stale_market_time_does_not_backdate_records() {
        let two_days_ago = (Utc::now() - ChronoDuration::days(2)).timestamp();
        let json = format!(
            r#"{{"chart":{{"result":[{{"meta":{{"symbol":"TCS.NS","regularMarketPrice":3900.0,"previousClose":3850.0,"regularMarketTime":{}}}}}]}}}}"#,
            two_days_ago
        );
        let produced_at = Utc::now();

        let quote = chart_to_quote(&Symbol::parse("TCS").unwrap(), &parse(&json));
        let index = chart_to_index(&TrackedIndex::new("TCS.NS", "TCS"), &parse(&json));

        assert!(quote.last_updated >= produced_at);
        assert!(index.last_updated >= produced_at);
    }

    #[test]
    fn test_error_payload_maps_to_symbol_not_found() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            first_result(response, "ZZZZ.NS"),
            Err(MarketDataError::SymbolNotFound(s)) if s == "ZZZZ.NS"
        ));
    }

    #[test]
    fn test_capabilities() {
        let provider = YahooProvider::new(reqwest::Client::new());
        let caps = provider.capabilities();
        assert!(caps.supports_quotes);
        assert!(caps.supports_indices);
        assert_eq!(provider.id(), "YAHOO");
    }
}
