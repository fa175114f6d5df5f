use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::models::{InstrumentType, RawNewsItem};

pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub instrument: InstrumentType,
    pub limit: usize,
}

impl CacheKey {
    pub fn new(symbol: &str, instrument: InstrumentType, limit: usize) -> Self {
        CacheKey {
            symbol: symbol.to_string(),
            instrument,
            limit,
        }
    }
}

struct CacheEntry {
    data: Vec<RawNewsItem>,
    stored_at: Instant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_items: usize,
    pub ttl_minutes: f64,
}

/// News batches keyed by (symbol, instrument type, limit) with a fixed TTL.
///
/// Expired entries are removed by the read that finds them; there is no sweeper.
#[derive(Clone)]
pub struct ResultCache {
    entries: Arc<Mutex<HashMap<CacheKey, CacheEntry>>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        ResultCache {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, symbol: &str, instrument: InstrumentType, limit: usize) -> Option<Vec<RawNewsItem>> {
        let key = CacheKey::new(symbol, instrument, limit);
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(&key) {
            None => return None,
            Some(entry) => entry.stored_at.elapsed() > self.ttl,
        };

        if expired {
            entries.remove(&key);
            tracing::debug!(symbol, instrument = %instrument, limit, "cache entry expired");
            return None;
        }

        tracing::debug!(symbol, instrument = %instrument, limit, "cache hit");
        entries.get(&key).map(|entry| entry.data.clone())
    }

    pub async fn set(&self, symbol: &str, instrument: InstrumentType, limit: usize, data: Vec<RawNewsItem>) {
        let count = data.len();
        let mut entries = self.entries.lock().await;
        entries.insert(
            CacheKey::new(symbol, instrument, limit),
            CacheEntry {
                data,
                stored_at: Instant::now(),
            },
        );
        tracing::debug!(symbol, instrument = %instrument, limit, count, "cached news batch");
    }

    /// Drops entries matching the given dimensions, every `limit` included.
    /// With neither dimension set the whole cache is cleared. Returns the number removed.
    pub async fn invalidate(&self, symbol: Option<&str>, instrument: Option<InstrumentType>) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();

        if symbol.is_none() && instrument.is_none() {
            entries.clear();
        } else {
            entries.retain(|key, _| {
                let symbol_match = symbol.map_or(true, |s| key.symbol == s);
                let type_match = instrument.map_or(true, |t| key.instrument == t);
                !(symbol_match && type_match)
            });
        }

        let removed = before - entries.len();
        if removed > 0 {
            tracing::info!(removed, "invalidated cache entries");
        }
        removed
    }

    pub async fn get_stats(&self) -> CacheStats {
        let entries = self.entries.lock().await;
        CacheStats {
            total_entries: entries.len(),
            total_items: entries.values().map(|entry| entry.data.len()).sum(),
            ttl_minutes: self.ttl.as_secs_f64() / 60.0,
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        ResultCache::new(DEFAULT_TTL)
    }
}
