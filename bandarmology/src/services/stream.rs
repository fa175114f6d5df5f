//! Supervised long-poll watcher over the provider's streaming endpoint.
//!
//! A watcher reconnects whenever the server drops the stream. Consecutive sessions
//! that deliver nothing count as failures; once they exceed the policy's
//! `max_retries` the watcher stops with [`BandarmologyError::RetriesExhausted`].
//! A session that delivered at least one event resets the count.

use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::errors::{BandarmologyError, Result};
use crate::models::{InstrumentType, NewsItem, RawNewsItem};
use crate::services::fetcher::{format_symbol, NewsSource};
use crate::services::retry::RetryPolicy;
use crate::services::sentiment::KeywordSentimentScorer;

/// Raw event decoded from one stream line.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    News(RawNewsItem),
    Channel(String),
}

/// Event delivered to stream consumers; news is scored by headline.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    News(NewsItem),
    Channel(String),
}

/// Decodes a `data:`-prefixed or bare JSON line. Anything else yields nothing.
pub fn parse_stream_line(line: &str) -> Vec<StreamEvent> {
    let line = line.trim();
    let raw_json = if let Some(rest) = line.strip_prefix("data:") {
        rest.trim()
    } else if line.starts_with('{') {
        line
    } else {
        return Vec::new();
    };

    let data: Value = match serde_json::from_str(raw_json) {
        Ok(data) => data,
        Err(_) => return Vec::new(),
    };

    if let Some(items) = data.get("items").and_then(Value::as_array) {
        return items
            .iter()
            .filter_map(|item| serde_json::from_value::<RawNewsItem>(item.clone()).ok())
            .map(StreamEvent::News)
            .collect();
    }

    match data.get("streaming") {
        Some(streaming) => {
            let channel = streaming
                .get("channel")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            vec![StreamEvent::Channel(channel)]
        }
        None => Vec::new(),
    }
}

/// Splits a configured watch target. `commodity:GOLD` and `forex:XAUUSD` pick the instrument
/// type; anything else, exchange-prefixed symbols such as `TVC:GOLD` included, is watched as forex.
pub fn parse_stream_target(entry: &str) -> (String, InstrumentType) {
    let entry = entry.trim();
    if let Some((prefix, symbol)) = entry.split_once(':') {
        if let Ok(instrument) = prefix.parse::<InstrumentType>() {
            return (symbol.trim().to_string(), instrument);
        }
    }
    (entry.to_string(), InstrumentType::Forex)
}

/// Receives decoded events from a [`NewsSource`] session and forwards them to the consumer.
pub struct StreamSink {
    tx: mpsc::Sender<StreamUpdate>,
    scorer: KeywordSentimentScorer,
    delivered: AtomicUsize,
}

impl StreamSink {
    pub fn new(tx: mpsc::Sender<StreamUpdate>, scorer: KeywordSentimentScorer) -> Self {
        StreamSink {
            tx,
            scorer,
            delivered: AtomicUsize::new(0),
        }
    }

    /// Returns false once the consumer has gone away.
    pub async fn send(&self, event: StreamEvent) -> bool {
        let update = match event {
            StreamEvent::News(raw) => {
                let result = self.scorer.analyze(&raw.title);
                StreamUpdate::News(NewsItem::from_raw(&raw).scored(&result))
            }
            StreamEvent::Channel(channel) => StreamUpdate::Channel(channel),
        };
        if self.tx.send(update).await.is_err() {
            return false;
        }
        self.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }
}

pub struct StreamHandle {
    symbol: String,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl StreamHandle {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the watcher to stop and waits for it.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await?
    }

    /// Waits for the watcher to stop on its own.
    pub async fn join(self) -> Result<()> {
        self.task.await?
    }
}

#[derive(Clone)]
pub struct NewsStreamSupervisor {
    source: Arc<dyn NewsSource>,
    policy: RetryPolicy,
    scorer: KeywordSentimentScorer,
}

impl NewsStreamSupervisor {
    pub fn new(source: Arc<dyn NewsSource>, policy: RetryPolicy) -> Self {
        NewsStreamSupervisor {
            source,
            policy,
            scorer: KeywordSentimentScorer::new(),
        }
    }

    pub fn spawn(&self, symbol: &str, instrument: InstrumentType, tx: mpsc::Sender<StreamUpdate>) -> StreamHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let formatted = format_symbol(symbol, instrument);
        let this = self.clone();
        let task = tokio::spawn(async move { this.run(formatted, tx, shutdown_rx).await });

        StreamHandle {
            symbol: symbol.to_string(),
            shutdown,
            task,
        }
    }

    async fn run(
        &self,
        formatted: String,
        tx: mpsc::Sender<StreamUpdate>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut failures: u32 = 0;

        loop {
            let sink = StreamSink::new(tx.clone(), self.scorer);
            tracing::info!(symbol = %formatted, "opening news stream");

            let outcome = tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(symbol = %formatted, "news stream stopped");
                    return Ok(());
                }
                outcome = self.source.stream_news(&formatted, &sink) => outcome,
            };

            if tx.is_closed() {
                tracing::info!(symbol = %formatted, "stream consumer gone, stopping");
                return Ok(());
            }
            if sink.delivered() > 0 {
                failures = 0;
            }

            let last_error = match outcome {
                Ok(()) => "stream closed by server".to_string(),
                Err(e) => e.to_string(),
            };
            failures += 1;

            if failures > self.policy.max_retries {
                tracing::error!(symbol = %formatted, failures, error = %last_error, "news stream giving up");
                return Err(BandarmologyError::RetriesExhausted {
                    attempts: failures,
                    last_error,
                });
            }

            let backoff = self.policy.backoff_for(failures - 1);
            tracing::warn!(
                symbol = %formatted,
                failures,
                backoff_ms = backoff.as_millis() as u64,
                error = %last_error,
                "news stream disconnected, reconnecting"
            );

            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(symbol = %formatted, "news stream stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
}
