use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::BandarmologyError;
use crate::holders::CacheStats;
use crate::models::{AccumulationReport, BrokerAccumulation, InstrumentType, NewsCollection, NewsItem};
use crate::services::{all_accumulating_stocks, broker_accumulation};
use crate::AppState;

const ENDPOINTS: &[&str] = &[
    "GET /",
    "GET /status",
    "GET /api/news/:symbol",
    "GET /api/news/:symbol/sentiment",
    "GET /api/news/:symbol/top",
    "GET /api/cache/stats",
    "DELETE /api/cache",
    "POST /api/accumulation/detect",
    "GET /api/accumulation",
    "GET /api/accumulation/stocks",
    "GET /api/accumulation/brokers/:code",
    "DELETE /api/accumulation",
    "POST /api/prices",
];

/// Handler error rendered as `{status, message, error_type}`.
pub struct ApiError(BandarmologyError);

impl From<BandarmologyError> for ApiError {
    fn from(error: BandarmologyError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            BandarmologyError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            BandarmologyError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            BandarmologyError::HttpError(_)
            | BandarmologyError::ApiError(_)
            | BandarmologyError::RateLimited(_)
            | BandarmologyError::RetriesExhausted { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::warn!(error = %self.0, "request rejected");
        }

        let body = json!({
            "status": "error",
            "message": self.0.to_string(),
            "error_type": error_type,
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

#[derive(Deserialize, Default)]
pub struct NewsQuery {
    #[serde(rename = "type")]
    pub instrument: Option<String>,
    pub limit: Option<usize>,
    pub delay_ms: Option<u64>,
    /// Restricts sentiment to items related to this symbol.
    pub filter: Option<String>,
    #[serde(default)]
    pub high_priority_only: bool,
    pub top: Option<usize>,
}

#[derive(Deserialize, Default)]
pub struct InvalidateQuery {
    pub symbol: Option<String>,
    #[serde(rename = "type")]
    pub instrument: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct StocksQuery {
    #[serde(default)]
    pub with_prices: bool,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct PricesRequest {
    pub codes: Vec<String>,
}

fn parse_instrument(raw: Option<&str>) -> Result<InstrumentType, BandarmologyError> {
    match raw {
        Some(raw) => InstrumentType::from_str(raw),
        None => Ok(InstrumentType::Forex),
    }
}

async fn load_news(state: &AppState, symbol: &str, query: &NewsQuery) -> Result<NewsCollection, BandarmologyError> {
    let instrument = parse_instrument(query.instrument.as_deref())?;
    let limit = query.limit.unwrap_or(state.config.default_limit);
    if limit == 0 || limit > 100 {
        return Err(BandarmologyError::InvalidRequest(format!(
            "limit must be between 1 and 100, got {}",
            limit
        )));
    }
    let delay = query
        .delay_ms
        .map(std::time::Duration::from_millis)
        .unwrap_or_else(|| state.config.fetch_delay());

    tracing::info!(symbol, instrument = %instrument, limit, "news analysis requested");
    let collection = state
        .pipeline
        .analyze_from_source(symbol, limit, instrument, delay)
        .await;

    if collection.is_empty() {
        return Err(BandarmologyError::NotFound(format!("no news available for {}", symbol)));
    }
    Ok(collection)
}

fn views(items: &[NewsItem]) -> Vec<Value> {
    items
        .iter()
        .filter_map(|item| serde_json::to_value(item.view()).ok())
        .collect()
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Bandarmology market API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let cache = state.pipeline.cache().get_stats().await;
    Json(json!({
        "status": "ready",
        "cache": cache,
        "default_limit": state.config.default_limit,
        "price_max_workers": state.prices.max_workers(),
        "accumulation_file": state.store.path().display().to_string(),
        "available_endpoints": ENDPOINTS,
    }))
}

pub async fn news_analysis(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Value> {
    let collection = load_news(&state, &symbol, &query).await?;
    let sentiment = state
        .pipeline
        .get_market_sentiment(&collection, query.filter.as_deref());
    let items = collection.sort_by_time(true).into_items();

    Ok(Json(json!({
        "symbol": symbol.to_uppercase(),
        "count": items.len(),
        "market_sentiment": sentiment,
        "news": views(&items),
    })))
}

pub async fn news_sentiment(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Value> {
    let collection = load_news(&state, &symbol, &query).await?;
    let sentiment = state
        .pipeline
        .get_market_sentiment(&collection, query.filter.as_deref());
    Ok(Json(json!({
        "symbol": symbol.to_uppercase(),
        "market_sentiment": sentiment,
    })))
}

pub async fn top_news(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Value> {
    let collection = load_news(&state, &symbol, &query).await?;
    let top = state
        .pipeline
        .get_top_news(&collection, query.top.unwrap_or(10), query.high_priority_only);
    Ok(Json(json!({
        "symbol": symbol.to_uppercase(),
        "count": top.len(),
        "news": views(&top),
    })))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline.cache().get_stats().await)
}

pub async fn invalidate_cache(
    State(state): State<AppState>,
    Query(query): Query<InvalidateQuery>,
) -> ApiResult<Value> {
    let instrument = match query.instrument.as_deref() {
        Some(raw) => Some(InstrumentType::from_str(raw)?),
        None => None,
    };
    let symbol = query.symbol.map(|s| s.trim().to_uppercase());
    let removed = state.pipeline.cache().invalidate(symbol.as_deref(), instrument).await;
    Ok(Json(json!({ "status": "ok", "removed": removed })))
}

pub async fn detect_accumulation(
    State(state): State<AppState>,
    Json(entries): Json<Vec<Value>>,
) -> ApiResult<AccumulationReport> {
    if entries.is_empty() {
        return Err(BandarmologyError::InvalidRequest("no broker entries supplied".to_string()).into());
    }

    let report = state.detector.detect_values(&entries).await;
    state.store.save(&report).await?;
    tracing::info!(entries = entries.len(), brokers = report.total_brokers, "accumulation detected");
    Ok(Json(report))
}

pub async fn get_accumulation(State(state): State<AppState>) -> Json<AccumulationReport> {
    Json(state.store.load().await)
}

pub async fn accumulating_stocks(
    State(state): State<AppState>,
    Query(query): Query<StocksQuery>,
) -> ApiResult<Value> {
    let report = state.store.load().await;
    let mut stocks = all_accumulating_stocks(&report);
    if let Some(limit) = query.limit {
        stocks.truncate(limit);
    }
    if query.with_prices {
        state.prices.enrich_with_prices(&mut stocks).await;
    }

    Ok(Json(json!({
        "last_updated": report.last_updated,
        "count": stocks.len(),
        "stocks": stocks,
    })))
}

pub async fn broker_detail(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<BrokerAccumulation> {
    let report = state.store.load().await;
    let code = code.trim().to_uppercase();
    match broker_accumulation(&report, &code) {
        Some(broker) => Ok(Json(broker.clone())),
        None => Err(BandarmologyError::NotFound(format!("broker {} has no accumulation data", code)).into()),
    }
}

pub async fn clear_accumulation(State(state): State<AppState>) -> ApiResult<Value> {
    state.store.clear().await?;
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn stock_prices(State(state): State<AppState>, Json(req): Json<PricesRequest>) -> ApiResult<Value> {
    if req.codes.is_empty() {
        return Err(BandarmologyError::InvalidRequest("codes cannot be empty".to_string()).into());
    }
    let prices = state.prices.fetch_all_prices(&req.codes).await;
    Ok(Json(json!({ "prices": prices })))
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/status", get(get_status))
        .route("/api/news/:symbol", get(news_analysis))
        .route("/api/news/:symbol/sentiment", get(news_sentiment))
        .route("/api/news/:symbol/top", get(top_news))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache", delete(invalidate_cache))
        .route("/api/accumulation/detect", post(detect_accumulation))
        .route("/api/accumulation", get(get_accumulation).delete(clear_accumulation))
        .route("/api/accumulation/stocks", get(accumulating_stocks))
        .route("/api/accumulation/brokers/:code", get(broker_detail))
        .route("/api/prices", post(stock_prices))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
