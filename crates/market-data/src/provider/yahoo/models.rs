//! Yahoo Finance API response models.
//!
//! These models are used for parsing the v8 chart API responses, which carry
//! the regular market price in `meta` and the intraday OHLCV series in
//! `indicators.quote`.

use serde::Deserialize;

/// Top-level wrapper for the chart API
#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

/// Chart container; exactly one of `result` / `error` is usually set
#[derive(Debug, Deserialize)]
pub struct YahooChart {
    #[serde(default)]
    pub result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    pub error: Option<YahooChartError>,
}

/// Error object returned for unknown symbols
#[derive(Debug, Deserialize)]
pub struct YahooChartError {
    pub code: Option<String>,
    pub description: Option<String>,
}

/// Individual chart result
#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooChartMeta,
    #[serde(default)]
    pub indicators: Option<YahooIndicators>,
}

/// Instrument metadata, including the regular market price
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooChartMeta {
    pub symbol: Option<String>,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub regular_market_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub chart_previous_close: Option<f64>,
}

/// Indicator series
#[derive(Debug, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooQuoteSeries>,
}

/// OHLCV series; entries are `null` for intervals without trades
#[derive(Debug, Default, Deserialize)]
pub struct YahooQuoteSeries {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

impl YahooQuoteSeries {
    /// Latest non-null value of a series.
    pub fn latest(series: &[Option<f64>]) -> Option<f64> {
        series.iter().rev().find_map(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_error_response() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        assert!(response.chart.result.is_none());
        assert_eq!(
            response.chart.error.unwrap().code.as_deref(),
            Some("Not Found")
        );
    }

    #[test]
    fn test_deserialize_meta_without_indicators() {
        let json = r#"{"chart":{"result":[{"meta":{"symbol":"^NSEI","regularMarketPrice":22123.4}}],"error":null}}"#;
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        let result = &response.chart.result.unwrap()[0];
        assert_eq!(result.meta.regular_market_price, Some(22123.4));
        assert!(result.indicators.is_none());
    }

    #[test]
    fn test_latest_skips_trailing_nulls() {
        let series = vec![Some(1.0), Some(2.0), None];
        assert_eq!(YahooQuoteSeries::latest(&series), Some(2.0));
        assert_eq!(YahooQuoteSeries::latest(&[]), None);
    }
}
