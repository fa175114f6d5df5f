pub mod accumulation;
pub mod fetcher;
pub mod pipeline;
pub mod prices;
pub mod retry;
pub mod sentiment;
pub mod stream;

pub use accumulation::{all_accumulating_stocks, broker_accumulation, AccumulationDetector};
pub use fetcher::{format_symbol, ContentFetcher, NewsSource, TradingViewClient};
pub use pipeline::NewsPipeline;
pub use prices::{normalize_stock_code, PriceService, PriceSource, YahooChartClient};
pub use retry::RetryPolicy;
pub use sentiment::{strength_label, KeywordSentimentScorer};
pub use stream::{parse_stream_target, NewsStreamSupervisor, StreamHandle, StreamUpdate};
