use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::BandarmologyError;

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentType {
    Forex,
    Commodity,
}

impl InstrumentType {
    /// Exchange prefix the news provider expects for bare tickers of this type.
    pub fn exchange_prefix(&self) -> &'static str {
        match self {
            InstrumentType::Forex => "FX",
            InstrumentType::Commodity => "TVC",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Forex => "forex",
            InstrumentType::Commodity => "commodity",
        }
    }
}

impl fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstrumentType {
    type Err = BandarmologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forex" => Ok(InstrumentType::Forex),
            "commodity" => Ok(InstrumentType::Commodity),
            other => Err(BandarmologyError::InvalidRequest(format!(
                "unknown instrument type '{}', expected forex or commodity",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Sentiment::Bullish => "BULLISH",
            Sentiment::Bearish => "BEARISH",
            Sentiment::Neutral => "NEUTRAL",
        };
        f.write_str(label)
    }
}

/// Output of the keyword scorer for one text blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    pub score: f64,
    pub confidence: f64,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentScore {
    pub label: Sentiment,
    pub score: f64,
    pub confidence: f64,
}

impl From<&SentimentResult> for SentimentScore {
    fn from(result: &SentimentResult) -> Self {
        SentimentScore {
            label: result.sentiment,
            score: result.score,
            confidence: result.confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SentimentState {
    Unscored,
    Scored(SentimentScore),
}

// ---------------------------------------------------------------------------
// Provider wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawProvider {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub logo_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRelatedSymbol {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub logoid: String,
}

fn default_urgency() -> i64 {
    2
}

/// One entry of the provider's news listing, optionally enriched with article text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNewsItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub published: i64,
    #[serde(default = "default_urgency")]
    pub urgency: i64,
    #[serde(default)]
    pub provider: RawProvider,
    #[serde(default, rename = "relatedSymbols")]
    pub related_symbols: Vec<RawRelatedSymbol>,
    #[serde(default, rename = "storyPath")]
    pub story_path: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub is_flash: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
}

/// Listing body. Entries stay raw until [`NewsListResponse::into_items`] so one bad entry
/// cannot reject the whole listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsListResponse {
    #[serde(default)]
    pub items: Vec<Value>,
}

impl NewsListResponse {
    /// Decodes every entry on its own. Entries that do not fit are logged and dropped.
    pub fn into_items(self) -> Vec<RawNewsItem> {
        let total = self.items.len();
        let items: Vec<RawNewsItem> = self
            .items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value::<RawNewsItem>(item) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping malformed news item");
                    None
                }
            })
            .collect();

        if items.len() < total {
            tracing::warn!(kept = items.len(), total, "news listing had malformed items");
        }
        items
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsDetail {
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub ast_description: Option<Value>,
}

// ---------------------------------------------------------------------------
// Domain model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NewsProvider {
    pub id: String,
    pub name: String,
    pub logo_id: String,
}

impl NewsProvider {
    const HIGH_CREDIBILITY: [&'static str; 3] = ["reuters", "dow-jones", "bloomberg"];
    const MEDIUM_CREDIBILITY: [&'static str; 2] = ["trading-economics", "tradingview"];

    pub fn credibility_score(&self) -> f64 {
        if Self::HIGH_CREDIBILITY.contains(&self.id.as_str()) {
            1.0
        } else if Self::MEDIUM_CREDIBILITY.contains(&self.id.as_str()) {
            0.7
        } else {
            0.5
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelatedSymbol {
    pub symbol: String,
    pub logoid: String,
}

impl RelatedSymbol {
    /// `TVC:GOLD` -> `TVC`; empty when the symbol carries no exchange.
    pub fn exchange(&self) -> &str {
        match self.symbol.split_once(':') {
            Some((exchange, _)) => exchange,
            None => "",
        }
    }

    /// `TVC:GOLD` -> `GOLD`; the whole symbol when there is no exchange.
    pub fn ticker(&self) -> &str {
        match self.symbol.split_once(':') {
            Some((_, ticker)) => ticker,
            None => &self.symbol,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    /// Unix epoch seconds.
    pub published: i64,
    pub urgency: i64,
    pub story_path: String,
    pub provider: NewsProvider,
    pub related_symbols: Vec<RelatedSymbol>,
    pub link: Option<String>,
    pub permission: Option<String>,
    pub is_flash: bool,
    sentiment: SentimentState,
}

impl NewsItem {
    pub fn from_raw(raw: &RawNewsItem) -> Self {
        NewsItem {
            id: raw.id.clone(),
            title: raw.title.clone(),
            published: raw.published,
            urgency: raw.urgency,
            story_path: raw.story_path.clone(),
            provider: NewsProvider {
                id: raw.provider.id.clone(),
                name: raw.provider.name.clone(),
                logo_id: raw.provider.logo_id.clone(),
            },
            related_symbols: raw
                .related_symbols
                .iter()
                .map(|s| RelatedSymbol {
                    symbol: s.symbol.clone(),
                    logoid: s.logoid.clone(),
                })
                .collect(),
            link: raw.link.clone(),
            permission: raw.permission.clone(),
            is_flash: raw.is_flash,
            sentiment: SentimentState::Unscored,
        }
    }

    /// Attaches a scorer result, consuming the unscored item.
    pub fn scored(mut self, result: &SentimentResult) -> Self {
        self.sentiment = SentimentState::Scored(SentimentScore::from(result));
        self
    }

    pub fn sentiment_score(&self) -> Option<SentimentScore> {
        match self.sentiment {
            SentimentState::Scored(score) => Some(score),
            SentimentState::Unscored => None,
        }
    }

    pub fn sentiment(&self) -> Option<Sentiment> {
        self.sentiment_score().map(|s| s.label)
    }

    pub fn published_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.published, 0)
    }

    pub fn published_str(&self) -> String {
        self.published_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }

    pub fn is_high_priority(&self) -> bool {
        self.urgency == 1 || self.is_flash
    }

    /// Importance in [0.5, 1.0] from urgency, flash flag and provider credibility.
    pub fn importance_score(&self) -> f64 {
        let mut score = 0.5;
        if self.urgency == 1 {
            score += 0.2;
        }
        if self.is_flash {
            score += 0.2;
        }
        score += self.provider.credibility_score() * 0.1;
        score.min(1.0)
    }

    /// Case-insensitive substring match against each related symbol and its ticker.
    pub fn matches_symbol(&self, target: &str) -> bool {
        let target = target.to_uppercase();
        self.related_symbols.iter().any(|s| {
            s.symbol.to_uppercase().contains(&target) || s.ticker().to_uppercase().contains(&target)
        })
    }

    pub fn view(&self) -> NewsItemView {
        NewsItemView {
            id: self.id.clone(),
            title: self.title.clone(),
            published: self.published,
            published_str: self.published_str(),
            urgency: self.urgency,
            is_flash: self.is_flash,
            is_high_priority: self.is_high_priority(),
            importance_score: round_to(self.importance_score(), 2),
            link: self.link.clone(),
            provider: ProviderView {
                id: self.provider.id.clone(),
                name: self.provider.name.clone(),
                credibility: self.provider.credibility_score(),
            },
            related_symbols: self
                .related_symbols
                .iter()
                .map(|s| SymbolView {
                    symbol: s.symbol.clone(),
                    ticker: s.ticker().to_string(),
                    exchange: s.exchange().to_string(),
                })
                .collect(),
            sentiment: self.sentiment_score(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderView {
    pub id: String,
    pub name: String,
    pub credibility: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolView {
    pub symbol: String,
    pub ticker: String,
    pub exchange: String,
}

/// Serialized shape of a news item, with derived fields expanded.
#[derive(Debug, Clone, Serialize)]
pub struct NewsItemView {
    pub id: String,
    pub title: String,
    pub published: i64,
    pub published_str: String,
    pub urgency: i64,
    pub is_flash: bool,
    pub is_high_priority: bool,
    pub importance_score: f64,
    pub link: Option<String>,
    pub provider: ProviderView,
    pub related_symbols: Vec<SymbolView>,
    pub sentiment: Option<SentimentScore>,
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentSummary {
    /// Number of scored items; the denominator of every percentage.
    pub total: usize,
    pub unscored: usize,
    pub bullish: usize,
    pub bullish_pct: f64,
    pub bearish: usize,
    pub bearish_pct: f64,
    pub neutral: usize,
    pub neutral_pct: f64,
    pub avg_score: f64,
}

/// Ordered set of news items. Every filter and sort returns a new collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsCollection {
    items: Vec<NewsItem>,
}

impl NewsCollection {
    pub fn new() -> Self {
        NewsCollection { items: Vec::new() }
    }

    pub fn add(&mut self, item: NewsItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[NewsItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<NewsItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NewsItem> {
        self.items.iter()
    }

    fn filtered<F>(&self, keep: F) -> NewsCollection
    where
        F: Fn(&NewsItem) -> bool,
    {
        NewsCollection {
            items: self.items.iter().filter(|item| keep(*item)).cloned().collect(),
        }
    }

    pub fn filter_by_symbol(&self, symbol: &str) -> NewsCollection {
        self.filtered(|item| item.matches_symbol(symbol))
    }

    pub fn filter_by_sentiment(&self, sentiment: Sentiment) -> NewsCollection {
        self.filtered(|item| item.sentiment() == Some(sentiment))
    }

    pub fn filter_high_priority(&self) -> NewsCollection {
        self.filtered(NewsItem::is_high_priority)
    }

    /// Sorted by publish time; newest first when `newest_first` is set.
    pub fn sort_by_time(&self, newest_first: bool) -> NewsCollection {
        let mut items = self.items.clone();
        if newest_first {
            items.sort_by(|a, b| b.published.cmp(&a.published));
        } else {
            items.sort_by(|a, b| a.published.cmp(&b.published));
        }
        NewsCollection { items }
    }

    pub fn sentiment_summary(&self) -> SentimentSummary {
        let scored: Vec<SentimentScore> = self.items.iter().filter_map(NewsItem::sentiment_score).collect();
        let total = scored.len();
        let unscored = self.items.len() - total;

        if total == 0 {
            return SentimentSummary {
                unscored,
                ..SentimentSummary::default()
            };
        }

        let count = |label: Sentiment| scored.iter().filter(|s| s.label == label).count();
        let pct = |n: usize| round_to(n as f64 / total as f64 * 100.0, 1);
        let bullish = count(Sentiment::Bullish);
        let bearish = count(Sentiment::Bearish);
        let neutral = count(Sentiment::Neutral);

        SentimentSummary {
            total,
            unscored,
            bullish,
            bullish_pct: pct(bullish),
            bearish,
            bearish_pct: pct(bearish),
            neutral,
            neutral_pct: pct(neutral),
            avg_score: round_to(scored.iter().map(|s| s.score).sum::<f64>() / total as f64, 2),
        }
    }
}

impl FromIterator<NewsItem> for NewsCollection {
    fn from_iter<I: IntoIterator<Item = NewsItem>>(iter: I) -> Self {
        NewsCollection {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a NewsCollection {
    type Item = &'a NewsItem;
    type IntoIter = std::slice::Iter<'a, NewsItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentBreakdown {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentPercentages {
    pub bullish: f64,
    pub bearish: f64,
    pub neutral: f64,
}

/// Market-level sentiment over a (possibly symbol-filtered) collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSentiment {
    pub overall_sentiment: Sentiment,
    pub strength: String,
    pub weighted_score: f64,
    pub average_score: f64,
    pub news_count: usize,
    pub scored_count: usize,
    pub breakdown: SentimentBreakdown,
    pub percentages: SentimentPercentages,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisExport {
    pub analyzed_at: String,
    pub total_news: usize,
    pub market_sentiment: MarketSentiment,
    pub news_items: Vec<NewsItemView>,
}

// ---------------------------------------------------------------------------
// Broker accumulation
// ---------------------------------------------------------------------------

fn unknown_broker() -> String {
    "UNKNOWN".to_string()
}

/// One uploaded broker-summary snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSnapshot {
    #[serde(default = "unknown_broker")]
    pub broker: String,
    #[serde(default)]
    pub periode: Option<Periode>,
    #[serde(default)]
    pub response: Option<SnapshotResponse>,
}

impl BrokerSnapshot {
    pub fn summary(&self) -> Option<&BrokerSummary> {
        self.response.as_ref()?.data.as_ref()?.broker_summary.as_ref()
    }

    pub fn date(&self) -> String {
        self.periode
            .as_ref()
            .and_then(|p| p.from.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Periode {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotResponse {
    #[serde(default)]
    pub data: Option<SnapshotData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub broker_summary: Option<BrokerSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerSummary {
    #[serde(default)]
    pub brokers_buy: Vec<BuyLine>,
    #[serde(default)]
    pub brokers_sell: Vec<SellLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuyLine {
    #[serde(default)]
    pub netbs_stock_code: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub blot: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub bval: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellLine {
    #[serde(default)]
    pub netbs_stock_code: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub slot: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub sval: Option<Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)`; only a missing field becomes `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Reads a numeric field that the upstream sends as number or string. Absent counts as zero,
/// `null` is malformed.
pub(crate) fn flexible_number(value: &Option<Value>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatedStock {
    pub stock_code: String,
    pub sector: String,
    pub appearances: usize,
    pub appearance_rate: f64,
    pub total_transactions: usize,
    pub buy_volume: i64,
    pub sell_volume: i64,
    pub net_volume: i64,
    pub buy_value: i64,
    pub sell_value: i64,
    pub net_value: i64,
    pub avg_price: f64,
    pub first_seen: String,
    pub last_seen: String,
    pub transaction_dates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerAccumulation {
    pub broker_code: String,
    pub total_transactions: usize,
    pub total_stocks_analyzed: usize,
    pub accumulating_stocks_count: usize,
    pub accumulating_stocks: Vec<AccumulatedStock>,
}

/// Persisted accumulation document, rewritten in full on every detection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccumulationReport {
    pub last_updated: Option<DateTime<Utc>>,
    pub total_brokers: usize,
    pub brokers: BTreeMap<String, BrokerAccumulation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerStock {
    pub broker_code: String,
    #[serde(flatten)]
    pub stock: AccumulatedStock,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, published: i64, symbols: &[&str]) -> RawNewsItem {
        RawNewsItem {
            id: id.to_string(),
            title: format!("title {}", id),
            published,
            urgency: 2,
            provider: RawProvider::default(),
            related_symbols: symbols
                .iter()
                .map(|s| RawRelatedSymbol {
                    symbol: s.to_string(),
                    logoid: String::new(),
                })
                .collect(),
            story_path: String::new(),
            link: None,
            permission: None,
            is_flash: false,
            full_content: None,
        }
    }

    #[test]
    fn related_symbol_split() {
        let with_exchange = RelatedSymbol {
            symbol: "TVC:GOLD".to_string(),
            logoid: String::new(),
        };
        assert_eq!(with_exchange.exchange(), "TVC");
        assert_eq!(with_exchange.ticker(), "GOLD");

        let bare = RelatedSymbol {
            symbol: "XAUUSD".to_string(),
            logoid: String::new(),
        };
        assert_eq!(bare.exchange(), "");
        assert_eq!(bare.ticker(), "XAUUSD");
    }

    #[test]
    fn importance_is_capped_at_one() {
        let mut item = raw("a", 0, &[]);
        item.urgency = 1;
        item.is_flash = true;
        item.provider.id = "reuters".to_string();
        let item = NewsItem::from_raw(&item);
        assert!(item.is_high_priority());
        assert_eq!(item.importance_score(), 1.0);
    }

    #[test]
    fn importance_uses_provider_tier() {
        let mut item = raw("a", 0, &[]);
        item.provider.id = "tradingview".to_string();
        let item = NewsItem::from_raw(&item);
        assert!(!item.is_high_priority());
        assert!((item.importance_score() - 0.57).abs() < 1e-9);
    }

    #[test]
    fn symbol_match_is_case_insensitive_substring() {
        let item = NewsItem::from_raw(&raw("a", 0, &["TVC:GOLD", "FX:XAUUSD"]));
        assert!(item.matches_symbol("gold"));
        assert!(item.matches_symbol("xau"));
        assert!(item.matches_symbol("fx:"));
        assert!(!item.matches_symbol("SILVER"));
    }

    #[test]
    fn sort_by_time_returns_new_collection() {
        let collection: NewsCollection = [raw("a", 10, &[]), raw("b", 30, &[]), raw("c", 20, &[])]
            .iter()
            .map(NewsItem::from_raw)
            .collect();

        let newest = collection.sort_by_time(true);
        let ids: Vec<&str> = newest.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);

        let oldest = collection.sort_by_time(false);
        assert_eq!(oldest.items()[0].id, "a");
        assert_eq!(collection.items()[0].id, "a");
        assert_eq!(collection.items()[1].id, "b");
    }

    #[test]
    fn flexible_numbers() {
        assert_eq!(flexible_number(&None), Some(0.0));
        assert_eq!(flexible_number(&Some(Value::from(12))), Some(12.0));
        assert_eq!(flexible_number(&Some(Value::from(" 3.5 "))), Some(3.5));
        assert_eq!(flexible_number(&Some(Value::from("abc"))), None);
        assert_eq!(flexible_number(&Some(Value::Null)), None);
    }

    #[test]
    fn null_lot_is_not_absent() {
        let line: BuyLine = serde_json::from_str(r#"{"netbs_stock_code":"BBCA","blot":null}"#).unwrap();
        assert_eq!(line.blot, Some(Value::Null));
        assert_eq!(line.bval, None);
        assert_eq!(flexible_number(&line.blot), None);
        assert_eq!(flexible_number(&line.bval), Some(0.0));
    }

    #[test]
    fn listing_keeps_well_formed_items() {
        let body: NewsListResponse = serde_json::from_str(
            r#"{"items":[
                {"id":"good","title":"Gold surges","published":1,"urgency":2},
                {"id":"nulls","title":"t","published":1,"urgency":null,"provider":null},
                {"id":"float","title":"t","published":1.5},
                {"id":"symbols","title":"t","published":1,"relatedSymbols":null}
            ]}"#,
        )
        .unwrap();

        let items = body.into_items();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);
    }

    #[test]
    fn raw_item_defaults_urgency() {
        let item: RawNewsItem = serde_json::from_str(r#"{"id":"x","title":"t"}"#).unwrap();
        assert_eq!(item.urgency, 2);
        assert!(item.related_symbols.is_empty());
        assert!(!item.is_flash);
    }
}
