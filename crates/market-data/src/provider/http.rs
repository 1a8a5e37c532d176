//! Shared HTTP client setup for scraping and API providers.

use std::time::Duration;

use reqwest::header;

use crate::errors::MarketDataError;

/// Browser User-Agent; both upstreams reject obvious bot clients.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Build the client shared by the bundled providers.
///
/// `timeout` caps a single HTTP request; the registry applies its own
/// per-provider timeout around the whole fetch on top of this.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, MarketDataError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(MarketDataError::from)
}
