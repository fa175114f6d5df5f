use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::holders::sectors::SectorIndex;
use crate::holders::SectorMap;
use crate::models::{
    flexible_number, round_to, AccumulatedStock, AccumulationReport, BrokerAccumulation, BrokerSnapshot, BrokerStock,
    BrokerSummary,
};

struct Transaction<'a> {
    date: String,
    stocks: BTreeSet<String>,
    summary: &'a BrokerSummary,
}

#[derive(Default)]
struct Tally {
    count: usize,
    dates: Vec<String>,
    buy_volume: f64,
    sell_volume: f64,
    buy_value: f64,
    sell_value: f64,
}

/// Finds stocks present in every snapshot a broker uploaded.
#[derive(Clone, Default)]
pub struct AccumulationDetector {
    sectors: Option<SectorMap>,
}

impl AccumulationDetector {
    pub fn new() -> Self {
        AccumulationDetector { sectors: None }
    }

    pub fn with_sectors(sectors: SectorMap) -> Self {
        AccumulationDetector { sectors: Some(sectors) }
    }

    /// Decodes uploaded entries one by one; entries that do not decode are skipped.
    pub fn parse_batch(entries: &[Value]) -> Vec<BrokerSnapshot> {
        entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| match serde_json::from_value::<BrokerSnapshot>(entry.clone()) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "skipping malformed broker entry");
                    None
                }
            })
            .collect()
    }

    pub async fn detect_values(&self, entries: &[Value]) -> AccumulationReport {
        self.detect(&Self::parse_batch(entries)).await
    }

    pub async fn detect(&self, batch: &[BrokerSnapshot]) -> AccumulationReport {
        let index = match &self.sectors {
            Some(map) => Some(map.get_or_init().await),
            None => None,
        };
        detect_with(batch, index)
    }
}

fn group_by_broker(batch: &[BrokerSnapshot]) -> BTreeMap<String, Vec<Transaction<'_>>> {
    let mut grouped: BTreeMap<String, Vec<Transaction<'_>>> = BTreeMap::new();

    for snapshot in batch {
        let Some(summary) = snapshot.summary() else {
            continue;
        };

        let stocks: BTreeSet<String> = summary
            .brokers_buy
            .iter()
            .filter_map(|line| line.netbs_stock_code.as_deref())
            .chain(summary.brokers_sell.iter().filter_map(|line| line.netbs_stock_code.as_deref()))
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect();

        if stocks.is_empty() {
            continue;
        }

        grouped.entry(snapshot.broker.clone()).or_default().push(Transaction {
            date: snapshot.date(),
            stocks,
            summary,
        });
    }

    grouped
}

fn tally_broker(transactions: &[Transaction<'_>]) -> BTreeMap<String, Tally> {
    let mut tallies: BTreeMap<String, Tally> = BTreeMap::new();

    for transaction in transactions {
        for code in &transaction.stocks {
            let tally = tallies.entry(code.clone()).or_default();
            tally.count += 1;
            tally.dates.push(transaction.date.clone());

            for line in transaction.summary.brokers_buy.iter() {
                if line.netbs_stock_code.as_deref() != Some(code.as_str()) {
                    continue;
                }
                match (flexible_number(&line.blot), flexible_number(&line.bval)) {
                    (Some(volume), Some(value)) => {
                        tally.buy_volume += volume;
                        tally.buy_value += value;
                    }
                    _ => tracing::debug!(stock = %code, "skipping buy line with bad numbers"),
                }
            }

            for line in transaction.summary.brokers_sell.iter() {
                if line.netbs_stock_code.as_deref() != Some(code.as_str()) {
                    continue;
                }
                match (flexible_number(&line.slot), flexible_number(&line.sval)) {
                    (Some(volume), Some(value)) => {
                        tally.sell_volume += volume;
                        tally.sell_value += value;
                    }
                    _ => tracing::debug!(stock = %code, "skipping sell line with bad numbers"),
                }
            }
        }
    }

    tallies
}

fn accumulated_stock(code: String, tally: Tally, total: usize, sector: Option<&str>) -> AccumulatedStock {
    let total_volume = tally.buy_volume + tally.sell_volume;
    let total_value = tally.buy_value + tally.sell_value;
    let avg_price = if total_volume > 0.0 {
        total_value / total_volume
    } else {
        0.0
    };

    let mut transaction_dates = tally.dates.clone();
    transaction_dates.sort();
    transaction_dates.dedup();

    AccumulatedStock {
        sector: sector.unwrap_or("Unknown").to_string(),
        appearances: tally.count,
        appearance_rate: tally.count as f64 / total as f64 * 100.0,
        total_transactions: total,
        buy_volume: tally.buy_volume as i64,
        sell_volume: tally.sell_volume as i64,
        net_volume: (tally.buy_volume - tally.sell_volume) as i64,
        buy_value: tally.buy_value as i64,
        sell_value: tally.sell_value as i64,
        net_value: (tally.buy_value - tally.sell_value) as i64,
        avg_price: round_to(avg_price, 2),
        first_seen: transaction_dates.first().cloned().unwrap_or_default(),
        last_seen: transaction_dates.last().cloned().unwrap_or_default(),
        transaction_dates,
        current_price: None,
        stock_code: code,
    }
}

fn detect_with(batch: &[BrokerSnapshot], sectors: Option<&SectorIndex>) -> AccumulationReport {
    let grouped = group_by_broker(batch);
    let mut brokers = BTreeMap::new();

    for (broker_code, transactions) in grouped {
        let total = transactions.len();
        let tallies = tally_broker(&transactions);
        let total_stocks_analyzed = tallies.len();

        let mut accumulating: Vec<AccumulatedStock> = tallies
            .into_iter()
            .filter(|(_, tally)| tally.count == total)
            .map(|(code, tally)| {
                let sector = sectors.and_then(|index| index.sector_of(&code));
                accumulated_stock(code, tally, total, sector)
            })
            .collect();
        accumulating.sort_by(|a, b| b.net_volume.abs().cmp(&a.net_volume.abs()));

        tracing::debug!(broker = %broker_code, total, accumulating = accumulating.len(), "broker analyzed");
        brokers.insert(
            broker_code.clone(),
            BrokerAccumulation {
                broker_code,
                total_transactions: total,
                total_stocks_analyzed,
                accumulating_stocks_count: accumulating.len(),
                accumulating_stocks: accumulating,
            },
        );
    }

    AccumulationReport {
        last_updated: Some(Utc::now()),
        total_brokers: brokers.len(),
        brokers,
    }
}

/// Every accumulating stock of every broker, largest absolute net volume first.
pub fn all_accumulating_stocks(report: &AccumulationReport) -> Vec<BrokerStock> {
    let mut all: Vec<BrokerStock> = report
        .brokers
        .iter()
        .flat_map(|(code, broker)| {
            broker.accumulating_stocks.iter().map(move |stock| BrokerStock {
                broker_code: code.clone(),
                stock: stock.clone(),
            })
        })
        .collect();
    all.sort_by(|a, b| b.stock.net_volume.abs().cmp(&a.stock.net_volume.abs()));
    all
}

pub fn broker_accumulation<'a>(report: &'a AccumulationReport, broker_code: &str) -> Option<&'a BrokerAccumulation> {
    report.brokers.get(broker_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(broker: &str, date: &str, buys: Value, sells: Value) -> Value {
        json!({
            "broker": broker,
            "periode": {"from": date, "to": date},
            "response": {"data": {"broker_summary": {"brokers_buy": buys, "brokers_sell": sells}}}
        })
    }

    #[test]
    fn strict_all_snapshots_rule() {
        let batch = AccumulationDetector::parse_batch(&[
            snapshot("YP", "2025-01-02", json!([{"netbs_stock_code": "BBCA", "blot": 10, "bval": 1000}]), json!([{"netbs_stock_code": "TLKM", "slot": 5, "sval": 200}])),
            snapshot("YP", "2025-01-03", json!([{"netbs_stock_code": "BBCA", "blot": "20", "bval": "2000"}]), json!([])),
            snapshot("YP", "2025-01-01", json!([{"netbs_stock_code": "TLKM", "blot": 1, "bval": 40}]), json!([{"netbs_stock_code": "BBCA", "slot": 6, "sval": 600}])),
        ]);
        let report = detect_with(&batch, None);
        let broker = &report.brokers["YP"];

        assert_eq!(broker.total_transactions, 3);
        assert_eq!(broker.total_stocks_analyzed, 2);
        assert_eq!(broker.accumulating_stocks_count, 1);

        let bbca = &broker.accumulating_stocks[0];
        assert_eq!(bbca.stock_code, "BBCA");
        assert_eq!(bbca.appearance_rate, 100.0);
        assert_eq!(bbca.buy_volume, 30);
        assert_eq!(bbca.sell_volume, 6);
        assert_eq!(bbca.net_volume, 24);
        assert_eq!(bbca.net_value, 2400);
        assert_eq!(bbca.avg_price, 100.0);
        assert_eq!(bbca.first_seen, "2025-01-01");
        assert_eq!(bbca.last_seen, "2025-01-03");
        assert_eq!(bbca.sector, "Unknown");
    }

    #[test]
    fn zero_volume_gives_zero_price() {
        let batch = AccumulationDetector::parse_batch(&[snapshot(
            "AK",
            "2025-01-02",
            json!([{"netbs_stock_code": "ANTM"}]),
            json!([]),
        )]);
        let report = detect_with(&batch, None);
        assert_eq!(report.brokers["AK"].accumulating_stocks[0].avg_price, 0.0);
    }

    #[test]
    fn bad_numbers_skip_the_line_only() {
        let batch = AccumulationDetector::parse_batch(&[snapshot(
            "AK",
            "2025-01-02",
            json!([
                {"netbs_stock_code": "ANTM", "blot": "n/a", "bval": 5},
                {"netbs_stock_code": "ANTM", "blot": 4, "bval": 8}
            ]),
            json!([]),
        )]);
        let stock = &detect_with(&batch, None).brokers["AK"].accumulating_stocks[0];
        assert_eq!(stock.buy_volume, 4);
        assert_eq!(stock.buy_value, 8);
    }

    #[test]
    fn brokers_without_valid_transactions_are_absent() {
        let entries = vec![
            json!("not an object"),
            json!({"broker": "XX", "response": {"data": {}}}),
            json!({"broker": "YY", "response": {"data": {"broker_summary": {"brokers_buy": [], "brokers_sell": []}}}}),
            json!({"broker": 42}),
        ];
        let batch = AccumulationDetector::parse_batch(&entries);
        assert_eq!(batch.len(), 2);

        let report = detect_with(&batch, None);
        assert_eq!(report.total_brokers, 0);
        assert!(report.brokers.is_empty());
    }

    #[test]
    fn missing_broker_is_grouped_as_unknown() {
        let entries = vec![json!({
            "response": {"data": {"broker_summary": {"brokers_buy": [{"netbs_stock_code": "BBRI", "blot": 1, "bval": 1}]}}}
        })];
        let report = detect_with(&AccumulationDetector::parse_batch(&entries), None);
        let unknown = &report.brokers["UNKNOWN"];
        assert_eq!(unknown.accumulating_stocks[0].first_seen, "unknown");
    }
}
