//! MoneyControl market data provider.
//!
//! Scrapes moneycontrol.com quote pages. The page layout changes often, so
//! every field is read through an ordered chain of selectors and the first
//! non-empty match wins. Used as the fallback behind Yahoo.

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{IndexRecord, QuoteRecord, Symbol, TrackedIndex};
use crate::provider::{MarketDataProvider, ProviderCapabilities, RateLimit};

pub const MONEYCONTROL_PROVIDER_ID: &str = "MONEYCONTROL";

const DEFAULT_BASE_URL: &str = "https://www.moneycontrol.com";

const NAME_SELECTORS: &[&str] = &[".comp_title h1", ".company_name"];

const PRICE_SELECTORS: &[&str] = &[
    ".inprice1 span:first-child",
    ".inprice1",
    "#nsecp",
    ".pcstkspr span:first-child",
];

const CHANGE_SELECTORS: &[&str] = &[
    ".nsechange",
    "#nsechange",
    ".pricupdn .grn span:first-child",
    ".pricupdn .rd span:first-child",
];

const PERCENT_CHANGE_SELECTORS: &[&str] = &[
    ".nsepp",
    "#nsepchange",
    ".pricupdn .grn span:nth-child(2)",
    ".pricupdn .rd span:nth-child(2)",
];

const INDEX_ROW_SELECTOR: &str = "#indicesTable tr, .tbldata tr";

/// One entry of the autosuggest response.
#[derive(Debug, Deserialize)]
struct Suggestion {
    #[serde(default)]
    link_src: Option<String>,
}

/// MoneyControl scraping provider.
pub struct MoneyControlProvider {
    client: reqwest::Client,
    base_url: String,
}

impl MoneyControlProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, MarketDataError> {
        let response = self.client.get(url).send().await?;

        match response.status() {
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(MarketDataError::RateLimited {
                provider: MONEYCONTROL_PROVIDER_ID.to_string(),
            }),
            status if !status.is_success() => Err(MarketDataError::ProviderError {
                provider: MONEYCONTROL_PROVIDER_ID.to_string(),
                message: format!("{} returned {}", url, status),
            }),
            _ => Ok(response.text().await?),
        }
    }

    /// Find the quote page URL through the autosuggest endpoint.
    async fn resolve_quote_url(&self, symbol: &Symbol) -> Result<String, MarketDataError> {
        let search_url = format!(
            "{}/mccode/common/autosuggestion_solr.php?q={}&type=1",
            self.base_url,
            encode(symbol.as_str())
        );
        let body = self.get_text(&search_url).await?;

        Ok(parse_search_link(&body).unwrap_or_else(|| {
            debug!("No MoneyControl suggestion for {}, using default page", symbol);
            format!("{}/india/stockpricequote/{}", self.base_url, symbol)
        }))
    }
}

/// First quote page link from an autosuggest response body.
fn parse_search_link(body: &str) -> Option<String> {
    let suggestions: Vec<Suggestion> = match serde_json::from_str(body.trim()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Error parsing MoneyControl search result: {}", e);
            return None;
        }
    };

    suggestions
        .into_iter()
        .next()
        .and_then(|s| s.link_src)
        .filter(|link| !link.trim().is_empty())
}

/// Parse a displayed number such as `"2,950.50"`, `"+12.35"` or `"(0.42%)"`.
fn parse_number(text: &str) -> Option<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '+' | '(' | ')' | '%') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the first selector in `selectors` that matches something non-empty.
fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).ok()?;
        document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

fn parse_quote_page(symbol: &Symbol, html: &str) -> QuoteRecord {
    let document = Html::parse_document(html);

    let mut record = QuoteRecord::new(symbol.as_str(), MONEYCONTROL_PROVIDER_ID);
    if let Some(name) = first_text(&document, NAME_SELECTORS) {
        record.company_name = name;
    }
    record.price = first_text(&document, PRICE_SELECTORS).and_then(|t| parse_number(&t));
    record.change = first_text(&document, CHANGE_SELECTORS).and_then(|t| parse_number(&t));
    record.percent_change =
        first_text(&document, PERCENT_CHANGE_SELECTORS).and_then(|t| parse_number(&t));
    record
}

fn parse_indices_page(html: &str) -> Vec<IndexRecord> {
    let document = Html::parse_document(html);
    let (Ok(row_selector), Ok(cell_selector)) =
        (Selector::parse(INDEX_ROW_SELECTOR), Selector::parse("td"))
    else {
        return Vec::new();
    };

    document
        .select(&row_selector)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&cell_selector).map(element_text).collect();
            if cells.len() < 3 {
                return None;
            }
            let mut record = IndexRecord::new(cells[0].clone(), MONEYCONTROL_PROVIDER_ID);
            record.value = parse_number(&cells[1]);
            record.change = parse_number(&cells[2]);
            Some(record)
        })
        .collect()
}

/// Keep only rows for tracked indices, matched on display name.
fn retain_tracked(records: Vec<IndexRecord>, indices: &[TrackedIndex]) -> Vec<IndexRecord> {
    records
        .into_iter()
        .filter(|record| {
            indices
                .iter()
                .any(|index| index.name.eq_ignore_ascii_case(record.name.trim()))
        })
        .collect()
}

/// The tracked rows of the indices page, or every row when no tracked name
/// matches the page's spelling.
fn select_indices(records: Vec<IndexRecord>, indices: &[TrackedIndex]) -> Vec<IndexRecord> {
    let tracked = retain_tracked(records.clone(), indices);
    if !tracked.is_empty() || records.is_empty() {
        return tracked;
    }

    warn!(
        "MoneyControl indices page matched none of {} tracked names; returning all {} rows",
        indices.len(),
        records.len()
    );
    records
}

#[async_trait]
impl MarketDataProvider for MoneyControlProvider {
    fn id(&self) -> &'static str {
        MONEYCONTROL_PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_quotes: true,
            supports_indices: true,
        }
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit {
            requests_per_minute: 60,
            max_concurrency: 5,
        }
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<QuoteRecord, MarketDataError> {
        let url = self.resolve_quote_url(symbol).await?;
        debug!("Fetching MoneyControl page {} for {}", url, symbol);

        let html = self.get_text(&url).await?;
        Ok(parse_quote_page(symbol, &html))
    }

    async fn fetch_indices(
        &self,
        indices: &[TrackedIndex],
    ) -> Result<Vec<IndexRecord>, MarketDataError> {
        let url = format!("{}/markets/indian-indices/", self.base_url);
        let html = self.get_text(&url).await?;
        Ok(select_indices(parse_indices_page(&html), indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const QUOTE_PAGE: &str = r#"
        <html><body>
          <div class="comp_title"><h1>Reliance Industries Ltd.</h1></div>
          <div class="inprice1"><span>2,950.50</span><span>INR</span></div>
          <div class="nsechange">+12.35</div>
          <div class="nsepp">(0.42%)</div>
        </body></html>
    "#;

    #[test]
    fn test_parse_quote_page() {
        let symbol = Symbol::parse("RELIANCE").unwrap();
        let record = parse_quote_page(&symbol, QUOTE_PAGE);

        assert_eq!(record.company_name, "Reliance Industries Ltd.");
        assert_eq!(record.price, Some(dec!(2950.50)));
        assert_eq!(record.change, Some(dec!(12.35)));
        assert_eq!(record.percent_change, Some(dec!(0.42)));
        assert_eq!(record.source.as_deref(), Some(MONEYCONTROL_PROVIDER_ID));
        assert!(record.high.is_none());
    }

    #[test]
    fn test_selector_chain_falls_through() {
        let html = r#"<div class="pricupdn"><span class="rd"><span>-4.10</span><span>(-1.2%)</span></span></div>
                      <span id="nsecp">310.00</span>"#;
        let symbol = Symbol::parse("ITC").unwrap();
        let record = parse_quote_page(&symbol, html);

        assert_eq!(record.company_name, "ITC");
        assert_eq!(record.price, Some(dec!(310.00)));
        assert_eq!(record.change, Some(dec!(-4.10)));
        assert_eq!(record.percent_change, Some(dec!(-1.2)));
    }

    #[test]
    fn test_page_without_price_leaves_it_absent() {
        let symbol = Symbol::parse("ZZZZ").unwrap();
        let record = parse_quote_page(&symbol, "<html><body>Not found</body></html>");
        assert!(record.price.is_none());
        assert_eq!(record.company_name, "ZZZZ");
    }

    #[test]
    fn test_parse_search_link() {
        let body = r#" [{"link_src":"https://www.moneycontrol.com/india/stockpricequote/refineries/relianceindustries/RI","pdt_dis_nm":"Reliance"}] "#;
        assert_eq!(
            parse_search_link(body).as_deref(),
            Some("https://www.moneycontrol.com/india/stockpricequote/refineries/relianceindustries/RI")
        );
        assert_eq!(parse_search_link("[]"), None);
        assert_eq!(parse_search_link("<html>"), None);
        assert_eq!(parse_search_link(r#"[{"link_src":""}]"#), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,23,456.70"), Some(dec!(123456.70)));
        assert_eq!(parse_number(" +0.5 "), Some(dec!(0.5)));
        assert_eq!(parse_number("(-0.42%)"), Some(dec!(-0.42)));
        assert_eq!(parse_number("0"), Some(Decimal::ZERO));
        assert_eq!(parse_number("--"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_parse_indices_page() {
        let html = r#"
            <table id="indicesTable">
              <tr><th>Index</th><th>Price</th><th>Change</th></tr>
              <tr><td>NIFTY 50</td><td>22,104.05</td><td>-43.20</td></tr>
              <tr><td>NIFTY BANK</td><td>47,327.85</td><td>112.40</td></tr>
              <tr><td>Broken</td></tr>
            </table>
        "#;
        let records = parse_indices_page(html);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "NIFTY 50");
        assert_eq!(records[0].value, Some(dec!(22104.05)));
        assert_eq!(records[0].change, Some(dec!(-43.20)));
        assert!(records[0].percent_change.is_none());
        assert_eq!(records[1].source, MONEYCONTROL_PROVIDER_ID);
    }

    #[test]
    fn test_retain_tracked_matches_names() {
        let records = vec![
            IndexRecord::new("NIFTY 50", MONEYCONTROL_PROVIDER_ID),
            IndexRecord::new("NIFTY REALTY", MONEYCONTROL_PROVIDER_ID),
        ];
        let tracked = retain_tracked(records, &[TrackedIndex::new("^NSEI", "Nifty 50")]);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].name, "NIFTY 50");
    }

    #[test]
    fn test_select_indices_prefers_tracked_rows() {
        let records = vec![
            IndexRecord::new("NIFTY 50", MONEYCONTROL_PROVIDER_ID),
            IndexRecord::new("NIFTY REALTY", MONEYCONTROL_PROVIDER_ID),
        ];
        let selected = select_indices(records, &[TrackedIndex::new("^NSEI", "NIFTY 50")]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "NIFTY 50");
    }

    #[test]
    fn test_select_indices_keeps_all_rows_when_nothing_matches() {
        let records = vec![
            IndexRecord::new("Nifty Fifty", MONEYCONTROL_PROVIDER_ID),
            IndexRecord::new("NIFTY REALTY", MONEYCONTROL_PROVIDER_ID),
        ];
        let selected = select_indices(records, &[TrackedIndex::new("^NSEI", "NIFTY 50")]);
        assert_eq!(selected.len(), 2);

        assert!(select_indices(Vec::new(), &[TrackedIndex::new("^NSEI", "NIFTY 50")]).is_empty());
    }
}
