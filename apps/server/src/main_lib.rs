use std::sync::Arc;

use stockpulse_market_data::{MarketDataService, RateLimitConfig, RateLimiter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub market_data_service: Arc<MarketDataService>,
    /// Per-client token buckets keyed by peer IP.
    pub client_limiter: Arc<RateLimiter>,
}

pub fn init_tracing() {
    let log_format = std::env::var("SP_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let service = MarketDataService::new(config.market_data.clone())?;
    tracing::info!(
        "Market data service ready (cache TTL {:?}, providers {:?})",
        config.market_data.cache_ttl,
        service.snapshot().providers
    );
    Ok(build_state_with_service(config, Arc::new(service)))
}

/// State around an already-built service. Tests use this to inject stub providers.
pub fn build_state_with_service(config: &Config, service: Arc<MarketDataService>) -> Arc<AppState> {
    let limits = RateLimitConfig::per_window(config.rate_limit_requests, config.rate_limit_window);
    Arc::new(AppState {
        market_data_service: service,
        client_limiter: Arc::new(RateLimiter::with_default(limits)),
    })
}
