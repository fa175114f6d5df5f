use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::{BandarmologyError, Result};
use crate::models::{InstrumentType, NewsDetail, NewsListResponse, RawNewsItem};
use crate::services::stream::{parse_stream_line, StreamSink};

/// Upstream news provider. The HTTP implementation is [`TradingViewClient`].
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Stage 1: candidate items for an exchange-prefixed symbol.
    async fn fetch_news_list(&self, formatted_symbol: &str) -> Result<Vec<RawNewsItem>>;

    /// Stage 2: the full story document for one item id.
    async fn fetch_news_detail(&self, news_id: &str) -> Result<NewsDetail>;

    /// Reads the long-poll stream until the server closes it, pushing events into `sink`.
    async fn stream_news(&self, formatted_symbol: &str, sink: &StreamSink) -> Result<()> {
        let _ = sink;
        Err(BandarmologyError::ApiError(format!(
            "streaming is not supported by this source ({})",
            formatted_symbol
        )))
    }
}

/// `XAUUSD` -> `FX:XAUUSD`, `GOLD` -> `TVC:GOLD`; prefixed symbols pass through.
pub fn format_symbol(symbol: &str, instrument: InstrumentType) -> String {
    let symbol = symbol.trim().to_uppercase();
    if symbol.contains(':') {
        symbol
    } else {
        format!("{}:{}", instrument.exchange_prefix(), symbol)
    }
}

#[derive(Clone)]
pub struct TradingViewClient {
    client: Client,
    stream_client: Client,
    list_url: String,
    detail_url: String,
    list_timeout: Duration,
    detail_timeout: Duration,
}

impl TradingViewClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://www.tradingview.com/"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.tradingview.com"));

        let client = ClientBuilder::new()
            .user_agent(config.user_agent.clone())
            .default_headers(headers.clone())
            .build()?;
        let stream_client = ClientBuilder::new()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(config.stream_timeout_secs))
            .build()?;

        Ok(TradingViewClient {
            client,
            stream_client,
            list_url: config.news_list_url.clone(),
            detail_url: config.news_detail_url.clone(),
            list_timeout: Duration::from_secs(config.list_timeout_secs),
            detail_timeout: Duration::from_secs(config.detail_timeout_secs),
        })
    }

    fn list_query(&self, formatted_symbol: &str, streaming: bool) -> String {
        format!(
            "{}?filter={}&filter={}&client=web&streaming={}&user_prostatus=non_pro",
            self.list_url,
            urlencoding::encode("lang:en"),
            urlencoding::encode(&format!("symbol:{}", formatted_symbol)),
            streaming
        )
    }

    fn detail_query(&self, news_id: &str) -> String {
        format!(
            "{}?id={}&lang=en&user_prostatus=non_pro",
            self.detail_url,
            urlencoding::encode(news_id)
        )
    }

    async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(BandarmologyError::ApiError(format!("{} error: {} - {}", what, status, error_text)))
    }
}

#[async_trait]
impl NewsSource for TradingViewClient {
    async fn fetch_news_list(&self, formatted_symbol: &str) -> Result<Vec<RawNewsItem>> {
        let url = self.list_query(formatted_symbol, false);
        tracing::debug!(url = %url, "requesting news list");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(self.list_timeout)
            .send()
            .await?;
        let response = Self::ensure_success(response, "news list").await?;

        let body: NewsListResponse = response.json().await?;
        Ok(body.into_items())
    }

    async fn fetch_news_detail(&self, news_id: &str) -> Result<NewsDetail> {
        let url = self.detail_query(news_id);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(self.detail_timeout)
            .send()
            .await?;
        let response = Self::ensure_success(response, "news detail").await?;

        Ok(response.json().await?)
    }

    async fn stream_news(&self, formatted_symbol: &str, sink: &StreamSink) -> Result<()> {
        let url = self.list_query(formatted_symbol, true);
        let mut response = self
            .stream_client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        response = Self::ensure_success(response, "news stream").await?;

        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                for event in parse_stream_line(&line) {
                    if !sink.send(event).await {
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Strips markup and links from article text and collapses whitespace.
#[derive(Clone, Debug)]
pub struct TextCleaner {
    html: Regex,
    url: Regex,
    whitespace: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self> {
        Ok(TextCleaner {
            html: Regex::new(r"<[^>]+>")?,
            url: Regex::new(r"https?://\S+|www\.\S+")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let cleaned = self.html.replace_all(text, " ");
        let cleaned = self.url.replace_all(&cleaned, " ");
        let cleaned = self.whitespace.replace_all(&cleaned, " ");
        cleaned.trim().to_string()
    }
}

fn collect_text(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::String(text) => out.push(text.clone()),
        Value::Object(map) => {
            if let Some(Value::Array(children)) = map.get("children") {
                for child in children {
                    collect_text(child, out);
                }
            }
        }
        _ => {}
    }
}

/// Two-stage news retrieval: listing, then sequential per-item detail lookups.
#[derive(Clone)]
pub struct ContentFetcher {
    source: Arc<dyn NewsSource>,
    cleaner: TextCleaner,
}

impl ContentFetcher {
    pub fn new(source: Arc<dyn NewsSource>) -> Result<Self> {
        Ok(ContentFetcher {
            source,
            cleaner: TextCleaner::new()?,
        })
    }

    pub fn source(&self) -> Arc<dyn NewsSource> {
        Arc::clone(&self.source)
    }

    pub async fn try_fetch_news_list(
        &self,
        symbol: &str,
        limit: usize,
        instrument: InstrumentType,
    ) -> Result<Vec<RawNewsItem>> {
        let formatted = format_symbol(symbol, instrument);
        let mut items = self.source.fetch_news_list(&formatted).await?;
        items.truncate(limit);
        Ok(items)
    }

    /// Stage 1 only. Failures are logged and reported as an empty listing.
    pub async fn fetch_news_list(&self, symbol: &str, limit: usize, instrument: InstrumentType) -> Vec<RawNewsItem> {
        match self.try_fetch_news_list(symbol, limit, instrument).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(symbol, instrument = %instrument, error = %e, "news list fetch failed");
                Vec::new()
            }
        }
    }

    pub async fn fetch_news_detail(&self, news_id: &str) -> Option<NewsDetail> {
        match self.source.fetch_news_detail(news_id).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                tracing::warn!(news_id, error = %e, "news detail fetch failed");
                None
            }
        }
    }

    /// Paragraph text from the document tree when present, otherwise the short description.
    pub fn extract_content_from_detail(&self, detail: &NewsDetail) -> String {
        let mut content = detail.short_description.clone();

        if let Some(ast) = &detail.ast_description {
            if ast.get("type").and_then(Value::as_str) == Some("root") {
                let mut paragraphs = Vec::new();
                let children = ast.get("children").and_then(Value::as_array);
                for child in children.into_iter().flatten() {
                    if child.get("type").and_then(Value::as_str) == Some("p") {
                        collect_text(child, &mut paragraphs);
                    }
                }
                if !paragraphs.is_empty() {
                    content = paragraphs.join(" ");
                }
            }
        }

        self.cleaner.clean(&content)
    }

    /// Stage 1 then Stage 2. Only a Stage-1 failure is an error; items whose
    /// detail lookup fails are dropped from the result.
    pub async fn try_fetch_news_with_content(
        &self,
        symbol: &str,
        limit: usize,
        instrument: InstrumentType,
        delay: Duration,
    ) -> Result<Vec<RawNewsItem>> {
        let news_list = self.try_fetch_news_list(symbol, limit, instrument).await?;
        let total = news_list.len();
        tracing::info!(symbol, total, "fetching news details");

        let mut with_content = Vec::with_capacity(total);
        for (i, mut item) in news_list.into_iter().enumerate() {
            match self.fetch_news_detail(&item.id).await {
                Some(detail) => {
                    let content = self.extract_content_from_detail(&detail);
                    tracing::debug!(news_id = %item.id, chars = content.len(), "got news content");
                    item.full_content = Some(content);
                    with_content.push(item);
                }
                None => tracing::debug!(news_id = %item.id, "skipping item without detail"),
            }

            if i + 1 < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::info!(symbol, fetched = with_content.len(), total, "news with content fetched");
        Ok(with_content)
    }

    /// Infallible variant: a Stage-1 failure yields an empty list.
    pub async fn fetch_news_with_content(
        &self,
        symbol: &str,
        limit: usize,
        instrument: InstrumentType,
        delay: Duration,
    ) -> Vec<RawNewsItem> {
        match self.try_fetch_news_with_content(symbol, limit, instrument, delay).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(symbol, instrument = %instrument, error = %e, "news fetch failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetcher() -> ContentFetcher {
        struct Empty;

        #[async_trait]
        impl NewsSource for Empty {
            async fn fetch_news_list(&self, _: &str) -> Result<Vec<RawNewsItem>> {
                Ok(Vec::new())
            }
            async fn fetch_news_detail(&self, id: &str) -> Result<NewsDetail> {
                Err(BandarmologyError::NotFound(id.to_string()))
            }
        }

        ContentFetcher::new(Arc::new(Empty)).unwrap()
    }

    #[test]
    fn symbol_formatting() {
        assert_eq!(format_symbol("xauusd", InstrumentType::Forex), "FX:XAUUSD");
        assert_eq!(format_symbol("GOLD", InstrumentType::Commodity), "TVC:GOLD");
        assert_eq!(format_symbol("oanda:xauusd", InstrumentType::Commodity), "OANDA:XAUUSD");
    }

    #[test]
    fn provider_query_strings() {
        let config = AppConfig {
            news_list_url: "https://news.test/symbol".to_string(),
            news_detail_url: "https://news.test/story".to_string(),
            ..AppConfig::default()
        };
        let client = TradingViewClient::new(&config).unwrap();

        assert_eq!(
            client.list_query("FX:XAUUSD", false),
            "https://news.test/symbol?filter=lang%3Aen&filter=symbol%3AFX%3AXAUUSD\
             &client=web&streaming=false&user_prostatus=non_pro"
        );
        assert_eq!(
            client.list_query("TVC:GOLD", true),
            "https://news.test/symbol?filter=lang%3Aen&filter=symbol%3ATVC%3AGOLD\
             &client=web&streaming=true&user_prostatus=non_pro"
        );
        assert_eq!(
            client.detail_query("tag:reuters.com,2025:newsml_L1N"),
            "https://news.test/story?id=tag%3Areuters.com%2C2025%3Anewsml_L1N&lang=en&user_prostatus=non_pro"
        );
    }

    #[test]
    fn short_description_when_no_tree() {
        let detail = NewsDetail {
            short_description: "Gold  <b>climbs</b>\n higher".to_string(),
            ast_description: None,
        };
        assert_eq!(fetcher().extract_content_from_detail(&detail), "Gold climbs higher");
    }

    #[test]
    fn paragraph_tree_preferred() {
        let detail = NewsDetail {
            short_description: "short".to_string(),
            ast_description: Some(json!({
                "type": "root",
                "children": [
                    {"type": "p", "children": ["Gold rose.", {"type": "url", "children": ["Reuters"]}]},
                    {"type": "image", "children": ["caption"]},
                    {"type": "p", "children": ["Silver followed. See https://example.com/x"]}
                ]
            })),
        };
        assert_eq!(
            fetcher().extract_content_from_detail(&detail),
            "Gold rose. Reuters Silver followed. See"
        );
    }

    #[test]
    fn empty_tree_falls_back() {
        let detail = NewsDetail {
            short_description: "fallback".to_string(),
            ast_description: Some(json!({"type": "root", "children": [{"type": "p", "children": []}]})),
        };
        assert_eq!(fetcher().extract_content_from_detail(&detail), "fallback");

        let not_root = NewsDetail {
            short_description: "fallback".to_string(),
            ast_description: Some(json!({"type": "doc", "children": [{"type": "p", "children": ["x"]}]})),
        };
        assert_eq!(fetcher().extract_content_from_detail(&not_root), "fallback");
    }
}
