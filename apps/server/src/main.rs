use std::{net::SocketAddr, time::Duration};

use stockpulse_server::{api::app_router, build_state, config::Config, init_tracing};
use tower_http::services::{ServeDir, ServeFile};

/// How often idle per-client buckets are dropped.
const CLIENT_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let config = Config::from_env()?;
    let state = build_state(&config).await?;

    state.market_data_service.spawn_sweepers();

    let limiter = state.client_limiter.clone();
    let idle = config.rate_limit_window;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLIENT_EVICTION_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = limiter.evict_idle(idle);
            if evicted > 0 {
                tracing::debug!("Evicted {} idle client buckets", evicted);
            }
        }
    });

    let mut router = app_router(state, &config);
    if let Some(static_dir) = &config.static_dir {
        let static_dir = std::path::PathBuf::from(static_dir);
        let index_file = static_dir.join("index.html");
        tracing::info!("Serving static files from {}", static_dir.display());
        router = router.fallback_service(ServeDir::new(static_dir).fallback(ServeFile::new(index_file)));
    }

    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
