use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::errors::{BandarmologyError, Result};
use crate::models::BrokerStock;
use crate::services::retry::RetryPolicy;

/// Quote lookup for an exchange ticker such as `BBCA.JK`.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// `Ok(None)` when the ticker exists but has no price. Unknown tickers are `NotFound`.
    async fn fetch_quote(&self, ticker: &str) -> Result<Option<f64>>;
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Option<ChartIndicators>,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default, rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResult {
    /// Market price from the metadata, else the last close of the day.
    fn price(&self) -> Option<f64> {
        self.meta.regular_market_price.or_else(|| {
            self.indicators
                .as_ref()?
                .quote
                .first()?
                .close
                .iter()
                .rev()
                .find_map(|close| *close)
        })
    }
}

fn status_error(ticker: &str, status: StatusCode, body: &str) -> BandarmologyError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => BandarmologyError::RateLimited(format!("price lookup for {}", ticker)),
        StatusCode::NOT_FOUND => BandarmologyError::NotFound(ticker.to_string()),
        _ => BandarmologyError::ApiError(format!("price error: {} - {}", status, body)),
    }
}

/// Errors reported inside a 200 chart body. Unknown or delisted tickers become `NotFound`.
fn chart_error(ticker: &str, error: &ChartError) -> BandarmologyError {
    let text = format!("{} {}", error.code, error.description).to_lowercase();
    if text.contains("not found") || text.contains("delisted") {
        BandarmologyError::NotFound(ticker.to_string())
    } else {
        BandarmologyError::ApiError(format!("price error: {}", error.description))
    }
}

#[derive(Clone)]
pub struct YahooChartClient {
    client: Client,
    url_template: String,
    timeout: Duration,
}

impl YahooChartClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder().user_agent(config.user_agent.clone()).build()?;
        Ok(YahooChartClient {
            client,
            url_template: config.price_api_url.clone(),
            timeout: Duration::from_secs(config.price_timeout_secs),
        })
    }
}

#[async_trait]
impl PriceSource for YahooChartClient {
    async fn fetch_quote(&self, ticker: &str) -> Result<Option<f64>> {
        let url = self.url_template.replace("{symbol}", &urlencoding::encode(ticker));
        let response = self.client.get(&url).timeout(self.timeout).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(status_error(ticker, status, &error_text));
        }

        let body: ChartResponse = response.json().await?;
        if let Some(error) = &body.chart.error {
            return Err(chart_error(ticker, error));
        }

        Ok(body
            .chart
            .result
            .as_deref()
            .and_then(|results| results.first())
            .and_then(ChartResult::price))
    }
}

/// Base code of a listed stock: `BBCA-W` -> `BBCA`, `BRPTBQCF6A` -> `BRPT`.
pub fn normalize_stock_code(code: &str) -> String {
    let code = code.trim();
    if let Some(base) = code.strip_suffix("-W") {
        return base.to_string();
    }

    if code.len() > 4 && code.is_ascii() {
        let (base, suffix) = code.split_at(4);
        if suffix.chars().any(|c| c.is_ascii_digit() || "QWXYZ".contains(c)) {
            return base.to_string();
        }
    }

    code.to_string()
}

pub const DEFAULT_PRICE_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Option<f64>,
    fetched_at: Instant,
}

/// Concurrent price lookups over a bounded number of in-flight requests.
///
/// Answers from the source, including "no price", are kept per code for the cache TTL so
/// repeated requests only go upstream for codes that are missing or expired.
#[derive(Clone)]
pub struct PriceService {
    source: Arc<dyn PriceSource>,
    max_workers: usize,
    delisted: Arc<Mutex<HashSet<String>>>,
    cache: Arc<Mutex<HashMap<String, CachedPrice>>>,
    cache_ttl: Duration,
    retry: RetryPolicy,
}

impl PriceService {
    pub fn new<I>(source: Arc<dyn PriceSource>, max_workers: usize, delisted: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        PriceService {
            source,
            max_workers: max_workers.max(1),
            delisted: Arc::new(Mutex::new(delisted.into_iter().collect())),
            cache: Arc::new(Mutex::new(HashMap::new())),
            cache_ttl: DEFAULT_PRICE_CACHE_TTL,
            retry: RetryPolicy::new(3, Duration::from_secs(5), Duration::from_secs(20)),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub async fn is_delisted(&self, code: &str) -> bool {
        self.delisted.lock().await.contains(&normalize_stock_code(code))
    }

    /// Number of codes whose cached answer has not expired.
    pub async fn cached_count(&self) -> usize {
        let cache = self.cache.lock().await;
        cache
            .values()
            .filter(|entry| entry.fetched_at.elapsed() <= self.cache_ttl)
            .count()
    }

    async fn cached(&self, code: &str) -> Option<Option<f64>> {
        let mut cache = self.cache.lock().await;
        match cache.get(code) {
            Some(entry) if entry.fetched_at.elapsed() <= self.cache_ttl => Some(entry.price),
            Some(_) => {
                cache.remove(code);
                None
            }
            None => None,
        }
    }

    /// Price of one stock. Delisted codes are skipped and fresh cached answers are reused;
    /// every failure is logged and reported as `None` without being cached.
    pub async fn fetch_price(&self, code: &str) -> Option<f64> {
        let normalized = normalize_stock_code(code);
        if normalized.is_empty() || self.delisted.lock().await.contains(&normalized) {
            return None;
        }
        if let Some(price) = self.cached(&normalized).await {
            return price;
        }

        let ticker = format!("{}.JK", normalized);
        let result = self
            .retry
            .retry_when(
                "price lookup",
                |e| matches!(e, BandarmologyError::RateLimited(_)),
                || self.source.fetch_quote(&ticker),
            )
            .await;

        match result {
            Ok(price) => {
                self.cache.lock().await.insert(
                    normalized,
                    CachedPrice {
                        price,
                        fetched_at: Instant::now(),
                    },
                );
                price
            }
            Err(BandarmologyError::NotFound(_)) => {
                tracing::debug!(stock = %normalized, "stock not found, marking delisted");
                self.delisted.lock().await.insert(normalized);
                None
            }
            Err(e) => {
                tracing::warn!(stock = %normalized, error = %e, "price lookup failed");
                None
            }
        }
    }

    /// Prices keyed by the codes given, duplicates looked up once.
    pub async fn fetch_all_prices(&self, codes: &[String]) -> HashMap<String, Option<f64>> {
        let unique: BTreeSet<String> = codes.iter().cloned().collect();
        let total = unique.len();

        let prices: HashMap<String, Option<f64>> = stream::iter(unique)
            .map(|code| async move {
                let price = self.fetch_price(&code).await;
                (code, price)
            })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        let found = prices.values().filter(|p| p.is_some()).count();
        tracing::info!(found, total, "stock prices fetched");
        prices
    }

    /// Sets `current_price` on every stock. Returns how many received a price.
    pub async fn enrich_with_prices(&self, stocks: &mut [BrokerStock]) -> usize {
        let codes: Vec<String> = stocks.iter().map(|s| s.stock.stock_code.clone()).collect();
        let prices = self.fetch_all_prices(&codes).await;

        let mut priced = 0;
        for entry in stocks.iter_mut() {
            entry.stock.current_price = prices.get(&entry.stock.stock_code).copied().flatten();
            if entry.stock.current_price.is_some() {
                priced += 1;
            }
        }
        priced
    }
}
