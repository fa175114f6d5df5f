mod common;

use axum::body::{Body, HttpBody};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

use bandarmology::holders::sectors::StaticSectorSource;
use bandarmology::holders::{SectorMap, SectorSource};
use bandarmology::routers::create_routes;
use bandarmology::{AppConfig, AppState};
use common::{raw_item, StubNews, StubPrices};

fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        fetch_delay_ms: 0,
        list_retries: 0,
        accumulation_file: dir.join("accumulation.json"),
        sector_cache_file: dir.join("sector_map.json"),
        ..AppConfig::default()
    }
}

fn app_with(dir: &Path, news: StubNews) -> Router {
    let chain: Vec<Box<dyn SectorSource>> = vec![Box::new(StaticSectorSource)];
    let state = AppState::with_sources(
        test_config(dir),
        Arc::new(news),
        Arc::new(StubPrices::new(&[("BBCA.JK", 9100.0)])),
        SectorMap::new(chain),
    )
    .unwrap();
    create_routes(state)
}

fn gold_news() -> StubNews {
    StubNews::new(vec![
        raw_item("1", "Gold surges to record high", 100, None),
        raw_item("2", "Gold falls sharply amid selloff", 200, None),
    ])
    .with_detail("1", "Gold surges to record high")
    .with_detail("2", "Gold falls sharply amid selloff")
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let mut body = response.into_body();
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[test]
fn test_config_validation() {
    let mut config = AppConfig::default();
    assert_ok!(config.validate());
    assert_eq!(config.cache_ttl().as_secs(), 900);
    assert_eq!(config.fetch_delay().as_millis(), 500);

    config.default_limit = 0;
    assert_err!(config.validate());
    config.default_limit = 101;
    assert_err!(config.validate());
    config.default_limit = 20;

    config.price_max_workers = 0;
    assert_err!(config.validate());
    config.price_max_workers = 51;
    assert_err!(config.validate());
    config.price_max_workers = 5;

    config.cache_ttl_minutes = 0;
    assert_err!(config.validate());
    config.cache_ttl_minutes = 15;

    config.price_cache_ttl_minutes = 0;
    assert_err!(config.validate());
    config.price_cache_ttl_minutes = 15;
    assert_eq!(config.price_cache_ttl().as_secs(), 900);

    config.news_list_url = "  ".to_string();
    assert_err!(config.validate());
}

#[tokio::test]
async fn test_health_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(dir.path(), gold_news());

    let (status, body) = send(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cache"]["total_entries"], 0);
    assert!(body["available_endpoints"].as_array().unwrap().len() >= 10);
}

#[tokio::test]
async fn test_news_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(dir.path(), gold_news());

    let (status, body) = send(&app, Method::GET, "/api/news/gold?type=commodity&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "GOLD");
    assert_eq!(body["count"], 2);
    assert_eq!(body["news"][0]["id"], "2");
    assert_eq!(body["market_sentiment"]["breakdown"]["bullish"], 1);
    assert_eq!(body["market_sentiment"]["breakdown"]["bearish"], 1);

    let (status, body) = send(&app, Method::GET, "/api/news/gold/top?type=commodity&limit=5&top=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(&app, Method::GET, "/api/news/gold/sentiment?type=commodity&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["market_sentiment"]["scored_count"], 2);

    let (_, stats) = send(&app, Method::GET, "/api/cache/stats", None).await;
    assert_eq!(stats["total_entries"], 1);
    assert_eq!(stats["total_items"], 2);

    let (status, body) = send(&app, Method::DELETE, "/api/cache?symbol=gold&type=commodity", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);
}

#[tokio::test]
async fn test_news_errors() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(dir.path(), gold_news());

    let (status, body) = send(&app, Method::GET, "/api/news/gold?type=stocks", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error_type"], "invalid_request");

    let (status, _) = send(&app, Method::GET, "/api/news/gold?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let empty = app_with(dir.path(), StubNews::new(Vec::new()));
    let (status, body) = send(&empty, Method::GET, "/api/news/XAUUSD", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_type"], "not_found");
}

#[tokio::test]
async fn test_accumulation_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(dir.path(), StubNews::new(Vec::new()));

    let batch = json!([
        {
            "broker": "YP",
            "periode": {"from": "2025-03-03", "to": "2025-03-03"},
            "response": {"data": {"broker_summary": {
                "brokers_buy": [{"netbs_stock_code": "BBCA", "blot": "10", "bval": "91000"}],
                "brokers_sell": [{"netbs_stock_code": "TLKM", "slot": 3, "sval": 10200}]
            }}}
        },
        {
            "broker": "YP",
            "periode": {"from": "2025-03-04", "to": "2025-03-04"},
            "response": {"data": {"broker_summary": {
                "brokers_buy": [{"netbs_stock_code": "BBCA", "blot": 5, "bval": 45500}]
            }}}
        },
        "garbage"
    ]);

    let (status, body) = send(&app, Method::POST, "/api/accumulation/detect", Some(batch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_brokers"], 1);
    assert_eq!(body["brokers"]["YP"]["accumulating_stocks"][0]["stock_code"], "BBCA");
    assert_eq!(body["brokers"]["YP"]["accumulating_stocks"][0]["sector"], "Financials");

    let (status, body) = send(&app, Method::GET, "/api/accumulation/brokers/yp", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accumulating_stocks_count"], 1);

    let (status, _) = send(&app, Method::GET, "/api/accumulation/brokers/ZZ", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/accumulation/stocks?with_prices=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["stocks"][0]["broker_code"], "YP");
    assert_eq!(body["stocks"][0]["current_price"], 9100.0);

    let (status, _) = send(&app, Method::DELETE, "/api/accumulation", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, "/api/accumulation", None).await;
    assert_eq!(body["total_brokers"], 0);

    let (status, _) = send(&app, Method::POST, "/api/accumulation/detect", Some(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_prices_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_with(dir.path(), StubNews::new(Vec::new()));

    let (status, body) = send(&app, Method::POST, "/api/prices", Some(json!({"codes": ["BBCA", "MITI"]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prices"]["BBCA"], 9100.0);
    assert!(body["prices"]["MITI"].is_null());

    let (status, _) = send(&app, Method::POST, "/api/prices", Some(json!({"codes": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
