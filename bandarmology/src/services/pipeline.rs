use chrono::Utc;
use std::path::Path;
use std::time::Duration;

use crate::errors::Result;
use crate::holders::ResultCache;
use crate::models::{
    round_to, AnalysisExport, InstrumentType, MarketSentiment, NewsCollection, NewsItem, RawNewsItem, Sentiment,
    SentimentBreakdown, SentimentPercentages, SentimentSummary,
};
use crate::services::fetcher::ContentFetcher;
use crate::services::retry::RetryPolicy;
use crate::services::sentiment::{strength_label, KeywordSentimentScorer};

const OVERALL_THRESHOLD: f64 = 0.3;

/// Fetch, score and aggregate news for one symbol.
#[derive(Clone)]
pub struct NewsPipeline {
    fetcher: ContentFetcher,
    cache: ResultCache,
    scorer: KeywordSentimentScorer,
    retry: RetryPolicy,
}

impl NewsPipeline {
    pub fn new(fetcher: ContentFetcher, cache: ResultCache, retry: RetryPolicy) -> Self {
        NewsPipeline {
            fetcher,
            cache,
            scorer: KeywordSentimentScorer::new(),
            retry,
        }
    }

    pub fn fetcher(&self) -> &ContentFetcher {
        &self.fetcher
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Cached fetch. A miss goes upstream, retrying a failed listing; only non-empty batches are stored.
    pub async fn fetch_cached(
        &self,
        symbol: &str,
        limit: usize,
        instrument: InstrumentType,
        delay: Duration,
    ) -> Vec<RawNewsItem> {
        let key_symbol = symbol.trim().to_uppercase();
        if let Some(items) = self.cache.get(&key_symbol, instrument, limit).await {
            return items;
        }

        let fetched = self
            .retry
            .retry("news list", || {
                self.fetcher
                    .try_fetch_news_with_content(&key_symbol, limit, instrument, delay)
            })
            .await;

        match fetched {
            Ok(items) => {
                if !items.is_empty() {
                    self.cache.set(&key_symbol, instrument, limit, items.clone()).await;
                }
                items
            }
            Err(e) => {
                tracing::warn!(symbol = %key_symbol, instrument = %instrument, error = %e, "news fetch failed, returning no data");
                Vec::new()
            }
        }
    }

    pub async fn analyze_from_source(
        &self,
        symbol: &str,
        limit: usize,
        instrument: InstrumentType,
        delay: Duration,
    ) -> NewsCollection {
        let items = self.fetch_cached(symbol, limit, instrument, delay).await;
        let collection = self.analyze_items(&items);
        tracing::info!(symbol, items = collection.len(), "news analysis complete");
        collection
    }

    /// Builds a collection in input order. Items without content stay unscored.
    pub fn analyze_items(&self, items: &[RawNewsItem]) -> NewsCollection {
        items
            .iter()
            .map(|raw| {
                let item = NewsItem::from_raw(raw);
                match raw.full_content.as_deref() {
                    Some(content) if !content.trim().is_empty() => {
                        let result = self.scorer.analyze(content);
                        tracing::debug!(news_id = %item.id, sentiment = %result.sentiment, score = result.score, "scored news item");
                        item.scored(&result)
                    }
                    _ => {
                        tracing::debug!(news_id = %item.id, "no content, left unscored");
                        item
                    }
                }
            })
            .collect()
    }

    /// Importance and confidence weighted sentiment, optionally restricted to one symbol.
    pub fn get_market_sentiment(&self, collection: &NewsCollection, symbol: Option<&str>) -> MarketSentiment {
        let filtered;
        let collection = match symbol {
            Some(symbol) => {
                filtered = collection.filter_by_symbol(symbol);
                &filtered
            }
            None => collection,
        };

        let summary = collection.sentiment_summary();

        let (weighted_sum, weight_total) = collection
            .iter()
            .filter_map(|item| item.sentiment_score().map(|s| (item.importance_score(), s)))
            .fold((0.0, 0.0), |(sum, total), (importance, score)| {
                let weight = importance * score.confidence;
                (sum + score.score * weight, total + weight)
            });
        let weighted = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            0.0
        };

        let overall = if weighted > OVERALL_THRESHOLD {
            Sentiment::Bullish
        } else if weighted < -OVERALL_THRESHOLD {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        };

        MarketSentiment {
            overall_sentiment: overall,
            strength: strength_label(weighted).to_string(),
            weighted_score: round_to(weighted, 2),
            average_score: summary.avg_score,
            news_count: collection.len(),
            scored_count: summary.total,
            breakdown: SentimentBreakdown {
                bullish: summary.bullish,
                bearish: summary.bearish,
                neutral: summary.neutral,
            },
            percentages: SentimentPercentages {
                bullish: summary.bullish_pct,
                bearish: summary.bearish_pct,
                neutral: summary.neutral_pct,
            },
            summary: narrative(symbol, collection.len(), &summary, overall, weighted),
        }
    }

    /// Newest first, at most `limit` items.
    pub fn get_top_news(&self, collection: &NewsCollection, limit: usize, high_priority_only: bool) -> Vec<NewsItem> {
        let candidates = if high_priority_only {
            collection.filter_high_priority()
        } else {
            collection.clone()
        };
        let mut items = candidates.sort_by_time(true).into_items();
        items.truncate(limit);
        items
    }

    pub fn export_results(&self, collection: &NewsCollection) -> AnalysisExport {
        AnalysisExport {
            analyzed_at: Utc::now().to_rfc3339(),
            total_news: collection.len(),
            market_sentiment: self.get_market_sentiment(collection, None),
            news_items: collection.iter().map(NewsItem::view).collect(),
        }
    }

    pub async fn export_to_file(&self, collection: &NewsCollection, path: &Path) -> Result<()> {
        let export = self.export_results(collection);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(&export)?).await?;
        tracing::info!(path = %path.display(), items = export.total_news, "analysis exported");
        Ok(())
    }
}

fn narrative(symbol: Option<&str>, news_count: usize, summary: &SentimentSummary, overall: Sentiment, weighted: f64) -> String {
    let subject = match symbol {
        Some(symbol) => format!("news on {}", symbol.to_uppercase()),
        None => "news".to_string(),
    };

    if summary.total == 0 {
        return format!("No scored {} among {} items; sentiment is NEUTRAL.", subject, news_count);
    }

    format!(
        "Across {} scored {} ({} fetched), {} bullish ({}%), {} bearish ({}%) and {} neutral ({}%). \
         Overall sentiment is {} ({}) with a weighted score of {:.2}.",
        summary.total,
        subject,
        news_count,
        summary.bullish,
        summary.bullish_pct,
        summary.bearish,
        summary.bearish_pct,
        summary.neutral,
        summary.neutral_pct,
        overall,
        strength_label(weighted),
        weighted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrative_without_scored_items() {
        let summary = SentimentSummary {
            unscored: 3,
            ..SentimentSummary::default()
        };
        let text = narrative(Some("gold"), 3, &summary, Sentiment::Neutral, 0.0);
        assert_eq!(text, "No scored news on GOLD among 3 items; sentiment is NEUTRAL.");
    }

    #[test]
    fn narrative_mentions_counts_and_label() {
        let summary = SentimentSummary {
            total: 2,
            unscored: 0,
            bullish: 2,
            bullish_pct: 100.0,
            avg_score: 0.5,
            ..SentimentSummary::default()
        };
        let text = narrative(None, 2, &summary, Sentiment::Bullish, 0.5);
        assert!(text.contains("2 bullish (100%)"));
        assert!(text.contains("Overall sentiment is BULLISH (BULLISH)"));
        assert!(text.ends_with("weighted score of 0.50."));
    }
}
