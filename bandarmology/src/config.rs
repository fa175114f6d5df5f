use anyhow::Result;
use config::Config;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_NEWS_LIST_URL: &str = "https://news-mediator.tradingview.com/public/view/v1/symbol";
pub const DEFAULT_NEWS_DETAIL_URL: &str = "https://news-mediator.tradingview.com/public/news/v1/story";
pub const DEFAULT_PRICE_API_URL: &str =
    "https://query1.finance.yahoo.com/v8/finance/chart/{symbol}?interval=1d&range=1d";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

#[derive(Clone, Debug, serde::Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub news_list_url: String,
    pub news_detail_url: String,
    pub user_agent: String,
    pub list_timeout_secs: u64,
    pub detail_timeout_secs: u64,
    pub stream_timeout_secs: u64,
    pub fetch_delay_ms: u64,
    pub default_limit: usize,
    pub cache_ttl_minutes: u64,
    pub list_retries: u32,
    pub price_api_url: String,
    pub price_max_workers: usize,
    pub price_timeout_secs: u64,
    pub price_cache_ttl_minutes: u64,
    pub delisted_stocks: Vec<String>,
    pub accumulation_file: PathBuf,
    pub sector_cache_file: PathBuf,
    pub sector_map_url: Option<String>,
    pub stream_symbols: Vec<String>,
    pub stream_max_retries: u32,
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            bind_addr: "0.0.0.0:8000".to_string(),
            news_list_url: DEFAULT_NEWS_LIST_URL.to_string(),
            news_detail_url: DEFAULT_NEWS_DETAIL_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            list_timeout_secs: 30,
            detail_timeout_secs: 15,
            stream_timeout_secs: 60,
            fetch_delay_ms: 500,
            default_limit: 20,
            cache_ttl_minutes: 15,
            list_retries: 2,
            price_api_url: DEFAULT_PRICE_API_URL.to_string(),
            price_max_workers: 5,
            price_timeout_secs: 15,
            price_cache_ttl_minutes: 15,
            delisted_stocks: [
                "NCKL", "MTMH", "ZONE", "MAIN", "CRAB", "BIMA", "KBLM", "SQMI", "PNSE", "TRAM",
                "WOMF", "KARW", "SRTG", "CPGT", "KOBX", "MITI",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            accumulation_file: PathBuf::from("data/stock_accumulation_data.json"),
            sector_cache_file: PathBuf::from("data/sector_map.json"),
            sector_map_url: None,
            stream_symbols: Vec::new(),
            stream_max_retries: 5,
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Validates value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.news_list_url.trim().is_empty() || self.news_detail_url.trim().is_empty() {
            return Err(anyhow::anyhow!("News provider URLs cannot be empty"));
        }

        if self.default_limit == 0 || self.default_limit > 100 {
            return Err(anyhow::anyhow!("default_limit must be between 1 and 100"));
        }

        if self.price_max_workers == 0 || self.price_max_workers > 50 {
            return Err(anyhow::anyhow!("price_max_workers must be between 1 and 50"));
        }

        if self.cache_ttl_minutes == 0 {
            return Err(anyhow::anyhow!("cache_ttl_minutes must be positive"));
        }

        if self.price_cache_ttl_minutes == 0 {
            return Err(anyhow::anyhow!("price_cache_ttl_minutes must be positive"));
        }

        Ok(())
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes * 60)
    }

    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.price_cache_ttl_minutes * 60)
    }
}

pub fn load_config() -> Result<AppConfig> {
    dotenvy::dotenv().ok();

    let defaults = AppConfig::default();
    let settings = Config::builder()
        .set_default("bind_addr", defaults.bind_addr.clone())?
        .set_default("news_list_url", defaults.news_list_url.clone())?
        .set_default("news_detail_url", defaults.news_detail_url.clone())?
        .set_default("user_agent", defaults.user_agent.clone())?
        .set_default("list_timeout_secs", defaults.list_timeout_secs)?
        .set_default("detail_timeout_secs", defaults.detail_timeout_secs)?
        .set_default("stream_timeout_secs", defaults.stream_timeout_secs)?
        .set_default("fetch_delay_ms", defaults.fetch_delay_ms)?
        .set_default("default_limit", defaults.default_limit as u64)?
        .set_default("cache_ttl_minutes", defaults.cache_ttl_minutes)?
        .set_default("list_retries", defaults.list_retries)?
        .set_default("price_api_url", defaults.price_api_url.clone())?
        .set_default("price_max_workers", defaults.price_max_workers as u64)?
        .set_default("price_timeout_secs", defaults.price_timeout_secs)?
        .set_default("price_cache_ttl_minutes", defaults.price_cache_ttl_minutes)?
        .set_default("delisted_stocks", defaults.delisted_stocks.clone())?
        .set_default("accumulation_file", defaults.accumulation_file.to_string_lossy().to_string())?
        .set_default("sector_cache_file", defaults.sector_cache_file.to_string_lossy().to_string())?
        .set_default("stream_symbols", Vec::<String>::new())?
        .set_default("stream_max_retries", defaults.stream_max_retries)?
        .add_source(config::File::with_name("config").required(false))
        .add_source(
            config::Environment::with_prefix("BANDARMOLOGY")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("stream_symbols")
                .with_list_parse_key("delisted_stocks"),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;

    Ok(config)
}
