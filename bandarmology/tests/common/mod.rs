#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bandarmology::errors::{BandarmologyError, Result};
use bandarmology::models::{NewsDetail, RawNewsItem, RawProvider, RawRelatedSymbol};
use bandarmology::services::fetcher::NewsSource;
use bandarmology::services::prices::PriceSource;
use bandarmology::services::stream::{parse_stream_line, StreamSink};

pub fn raw_item(id: &str, title: &str, published: i64, content: Option<&str>) -> RawNewsItem {
    RawNewsItem {
        id: id.to_string(),
        title: title.to_string(),
        published,
        urgency: 2,
        provider: RawProvider {
            id: "tradingview".to_string(),
            name: "TradingView".to_string(),
            logo_id: String::new(),
        },
        related_symbols: vec![RawRelatedSymbol {
            symbol: "TVC:GOLD".to_string(),
            logoid: String::new(),
        }],
        story_path: format!("/news/{}", id),
        link: None,
        permission: None,
        is_flash: false,
        full_content: content.map(str::to_string),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StreamBehavior {
    /// Every session fails immediately.
    Fail,
    /// Every session stays open until cancelled.
    Hang,
    /// Each session delivers one headline, then the server closes it.
    DeliverOnce,
}

/// In-memory news provider recording the calls made against it.
pub struct StubNews {
    pub items: Vec<RawNewsItem>,
    pub details: HashMap<String, NewsDetail>,
    pub list_failures: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
    pub detail_order: Mutex<Vec<String>>,
    pub stream_sessions: AtomicUsize,
    pub stream: StreamBehavior,
}

impl StubNews {
    pub fn new(items: Vec<RawNewsItem>) -> Self {
        StubNews {
            items,
            details: HashMap::new(),
            list_failures: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
            detail_order: Mutex::new(Vec::new()),
            stream_sessions: AtomicUsize::new(0),
            stream: StreamBehavior::Fail,
        }
    }

    pub fn with_detail(mut self, id: &str, short_description: &str) -> Self {
        self.details.insert(
            id.to_string(),
            NewsDetail {
                short_description: short_description.to_string(),
                ast_description: None,
            },
        );
        self
    }

    pub fn failing_lists(self, failures: usize) -> Self {
        self.list_failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn streaming(mut self, behavior: StreamBehavior) -> Self {
        self.stream = behavior;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn stream_sessions(&self) -> usize {
        self.stream_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsSource for StubNews {
    async fn fetch_news_list(&self, _formatted_symbol: &str) -> Result<Vec<RawNewsItem>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.list_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.list_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(BandarmologyError::ApiError("news list error: 503".to_string()));
        }
        Ok(self.items.clone())
    }

    async fn fetch_news_detail(&self, news_id: &str) -> Result<NewsDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.detail_order.lock().unwrap().push(news_id.to_string());
        self.details
            .get(news_id)
            .cloned()
            .ok_or_else(|| BandarmologyError::NotFound(news_id.to_string()))
    }

    async fn stream_news(&self, formatted_symbol: &str, sink: &StreamSink) -> Result<()> {
        self.stream_sessions.fetch_add(1, Ordering::SeqCst);
        match self.stream {
            StreamBehavior::Fail => Err(BandarmologyError::ApiError(format!("stream refused for {}", formatted_symbol))),
            StreamBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            StreamBehavior::DeliverOnce => {
                let line = r#"data: {"items":[{"id":"s1","title":"Gold surges to record high"}]}"#;
                for event in parse_stream_line(line) {
                    sink.send(event).await;
                }
                Ok(())
            }
        }
    }
}

/// Price source answering from a fixed table after a simulated delay.
pub struct StubPrices {
    pub prices: HashMap<String, f64>,
    pub missing: Vec<String>,
    pub rate_limited_once: Mutex<Vec<String>>,
    pub latency: Duration,
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl StubPrices {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        StubPrices {
            prices: prices.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
            missing: Vec::new(),
            rate_limited_once: Mutex::new(Vec::new()),
            latency: Duration::from_millis(100),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_missing(mut self, ticker: &str) -> Self {
        self.missing.push(ticker.to_string());
        self
    }

    pub fn rate_limit_once(self, ticker: &str) -> Self {
        self.rate_limited_once.lock().unwrap().push(ticker.to_string());
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, ticker: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|t| *t == ticker).count()
    }
}

#[async_trait]
impl PriceSource for StubPrices {
    async fn fetch_quote(&self, ticker: &str) -> Result<Option<f64>> {
        self.calls.lock().unwrap().push(ticker.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut limited = self.rate_limited_once.lock().unwrap();
            if let Some(pos) = limited.iter().position(|t| t == ticker) {
                limited.remove(pos);
                return Err(BandarmologyError::RateLimited(ticker.to_string()));
            }
        }

        if self.missing.iter().any(|t| t == ticker) {
            return Err(BandarmologyError::NotFound(ticker.to_string()));
        }
        Ok(self.prices.get(ticker).copied())
    }
}
