use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod errors;
pub mod holders;
pub mod models;
pub mod routers;
pub mod services;

pub use config::{load_config, AppConfig};
pub use errors::{BandarmologyError, Result};
pub use holders::{AccumulationStore, CacheKey, CacheStats, ResultCache, SectorMap, SectorSource};
pub use models::{
    AccumulatedStock, AccumulationReport, BrokerAccumulation, BrokerStock, InstrumentType, MarketSentiment,
    NewsCollection, NewsItem, RawNewsItem, Sentiment, SentimentResult,
};
pub use services::{
    AccumulationDetector, ContentFetcher, KeywordSentimentScorer, NewsPipeline, NewsSource, NewsStreamSupervisor,
    PriceService, PriceSource, RetryPolicy, TradingViewClient, YahooChartClient,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: NewsPipeline,
    pub detector: AccumulationDetector,
    pub store: AccumulationStore,
    pub prices: PriceService,
}

impl AppState {
    /// Wires the HTTP-backed news and price sources.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let news: Arc<dyn NewsSource> = Arc::new(TradingViewClient::new(&config)?);
        let prices: Arc<dyn PriceSource> = Arc::new(YahooChartClient::new(&config)?);
        let sectors = SectorMap::with_default_chain(
            Client::new(),
            config.sector_cache_file.clone(),
            config.sector_map_url.clone(),
        );
        Self::with_sources(config, news, prices, sectors)
    }

    pub fn with_sources(
        config: AppConfig,
        news: Arc<dyn NewsSource>,
        prices: Arc<dyn PriceSource>,
        sectors: SectorMap,
    ) -> Result<Self> {
        let fetcher = ContentFetcher::new(news)?;
        let cache = ResultCache::new(config.cache_ttl());
        let retry = RetryPolicy::new(config.list_retries, Duration::from_secs(1), Duration::from_secs(30));

        Ok(AppState {
            pipeline: NewsPipeline::new(fetcher, cache, retry),
            detector: AccumulationDetector::with_sectors(sectors),
            store: AccumulationStore::new(config.accumulation_file.clone()),
            prices: PriceService::new(prices, config.price_max_workers, config.delisted_stocks.clone())
                .with_cache_ttl(config.price_cache_ttl()),
            config,
        })
    }

    pub fn stream_supervisor(&self) -> NewsStreamSupervisor {
        let policy = RetryPolicy::new(self.config.stream_max_retries, Duration::from_secs(1), Duration::from_secs(60));
        NewsStreamSupervisor::new(self.pipeline.fetcher().source(), policy)
    }
}
