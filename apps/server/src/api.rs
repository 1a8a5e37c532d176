use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stockpulse_market_data::{IndexRecord, QuoteRecord};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Rate limit key for requests that arrive without peer information.
const UNKNOWN_CLIENT: &str = "unknown";

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/status", get(status))
        .route("/stock/{symbol}", get(get_stock))
        .route("/stocks", get(get_stocks))
        .route("/indices", get(get_indices))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            limit_per_client,
        ));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Spend one token from the caller's bucket, answering 429 when it is empty.
async fn limit_per_client(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    if !state.client_limiter.try_acquire(&client) {
        tracing::warn!("Rate limit exceeded for {}", client);
        return Err(ApiError::TooManyRequests);
    }
    Ok(next.run(request).await)
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    message: &'static str,
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK",
        timestamp: Utc::now(),
        message: "Indian Stock API is running",
    })
}

async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Json<QuoteRecord> {
    Json(state.market_data_service.get_quote(&symbol).await)
}

#[derive(Deserialize)]
struct StocksQuery {
    symbols: Option<String>,
}

async fn get_stocks(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StocksQuery>,
) -> ApiResult<Json<Vec<QuoteRecord>>> {
    let raw = q
        .symbols
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("Please provide stock symbols as query parameter".to_string())
        })?;
    let symbols: Vec<&str> = raw.split(',').collect();
    Ok(Json(state.market_data_service.get_quotes(&symbols).await))
}

async fn get_indices(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<IndexRecord>>> {
    let indices = state.market_data_service.get_indices().await?;
    Ok(Json(indices))
}
