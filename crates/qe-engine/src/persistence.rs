//! Persistence boundary (§6): two narrow traits the engine writes through on
//! every state change, with a file-backed JSONL implementation for local
//! runs and tests. A production-grade store is a separate implementation of
//! the same traits, supplied by the caller — nothing here assumes a
//! particular database.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use qe_schemas::{CompletedTrade, Position};
use serde::{Deserialize, Serialize};

/// Durable snapshot of one open position, keyed by symbol. Mirrors
/// `qe_schemas::Position` field-for-field; kept as its own type so the
/// persisted shape can evolve independently of the in-memory one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub side: String,
    pub qty: i64,
    pub entry_price_micros: i64,
    pub entry_ts: i64,
    pub highest_price_micros: i64,
    pub lowest_price_micros: i64,
    pub current_stop_price_micros: i64,
    pub initial_stop_price_micros: i64,
    pub take_profit_price_micros: i64,
    pub trailing_active: bool,
    pub trailing_stop_price_micros: Option<i64>,
    pub strategy: String,
    pub confidence_at_entry: f64,
    #[serde(default)]
    pub protective_stop_order_id: Option<String>,
}

impl From<&Position> for PositionSnapshot {
    fn from(p: &Position) -> Self {
        Self {
            symbol: p.symbol.as_str().to_string(),
            side: match p.side {
                qe_schemas::PositionSide::Long => "long".to_string(),
                qe_schemas::PositionSide::Short => "short".to_string(),
            },
            qty: p.qty,
            entry_price_micros: p.entry_price_micros,
            entry_ts: p.entry_ts,
            highest_price_micros: p.highest_price_micros,
            lowest_price_micros: p.lowest_price_micros,
            current_stop_price_micros: p.current_stop_price_micros,
            initial_stop_price_micros: p.initial_stop_price_micros,
            take_profit_price_micros: p.take_profit_price_micros,
            trailing_active: p.trailing_active,
            trailing_stop_price_micros: p.trailing_stop_price_micros,
            strategy: p.strategy.clone(),
            confidence_at_entry: p.confidence_at_entry,
            protective_stop_order_id: p.protective_stop_order_id.clone(),
        }
    }
}

/// Append-only completed-trade log. Write-through: every call must durably
/// persist before the caller proceeds to the next order.
pub trait TradeLog: Send + Sync {
    fn append(&self, trade: &CompletedTrade) -> anyhow::Result<()>;

    /// All trades recorded so far, in append order — the input to the EOD
    /// reporter.
    fn all(&self) -> anyhow::Result<Vec<CompletedTrade>>;
}

/// Key-value store for open-position snapshots, keyed by symbol.
pub trait PositionSnapshotStore: Send + Sync {
    fn put(&self, symbol: &str, snapshot: &PositionSnapshot) -> anyhow::Result<()>;
    fn get(&self, symbol: &str) -> anyhow::Result<Option<PositionSnapshot>>;
    fn delete(&self, symbol: &str) -> anyhow::Result<()>;
    /// All snapshots currently stored — used on boot to seed recovery before
    /// cross-checking against the broker.
    fn all(&self) -> anyhow::Result<Vec<PositionSnapshot>>;
}

/// Append-only JSONL trade log. One `CompletedTrade` per line.
pub struct JsonlTradeLog {
    path: PathBuf,
}

impl JsonlTradeLog {
    pub fn new(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }
}

impl TradeLog for JsonlTradeLog {
    fn append(&self, trade: &CompletedTrade) -> anyhow::Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(trade)?;
        writeln!(f, "{line}")?;
        f.flush()?;
        Ok(())
    }

    fn all(&self) -> anyhow::Result<Vec<CompletedTrade>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let f = File::open(&self.path)?;
        let reader = BufReader::new(f);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            out.push(serde_json::from_str(trimmed)?);
        }
        Ok(out)
    }
}

/// One JSON file per symbol under `dir/`, overwritten on every `put`. Simple
/// and durable enough for local runs: a crash between writes loses at most
/// the in-flight update, and reconcile against the broker on the next boot
/// catches any resulting drift.
pub struct JsonlPositionSnapshotStore {
    dir: PathBuf,
}

impl JsonlPositionSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.json"))
    }
}

impl PositionSnapshotStore for JsonlPositionSnapshotStore {
    fn put(&self, symbol: &str, snapshot: &PositionSnapshot) -> anyhow::Result<()> {
        let tmp = self.path_for(symbol).with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?)?;
        fs::rename(&tmp, self.path_for(symbol))?;
        Ok(())
    }

    fn get(&self, symbol: &str) -> anyhow::Result<Option<PositionSnapshot>> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn delete(&self, symbol: &str) -> anyhow::Result<()> {
        let path = self.path_for(symbol);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn all(&self) -> anyhow::Result<Vec<PositionSnapshot>> {
        let mut out = Vec::new();
        if !self.dir.exists() {
            return Ok(out);
        }
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                let bytes = fs::read(&path)?;
                out.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(out)
    }
}

/// Test/dry-run store: nothing survives process exit.
#[derive(Default)]
pub struct InMemoryTradeLog {
    inner: std::sync::Mutex<Vec<CompletedTrade>>,
}

impl TradeLog for InMemoryTradeLog {
    fn append(&self, trade: &CompletedTrade) -> anyhow::Result<()> {
        self.inner.lock().unwrap().push(trade.clone());
        Ok(())
    }

    fn all(&self) -> anyhow::Result<Vec<CompletedTrade>> {
        Ok(self.inner.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct InMemoryPositionSnapshotStore {
    inner: std::sync::Mutex<std::collections::BTreeMap<String, PositionSnapshot>>,
}

impl PositionSnapshotStore for InMemoryPositionSnapshotStore {
    fn put(&self, symbol: &str, snapshot: &PositionSnapshot) -> anyhow::Result<()> {
        self.inner
            .lock()
            .unwrap()
            .insert(symbol.to_string(), snapshot.clone());
        Ok(())
    }

    fn get(&self, symbol: &str) -> anyhow::Result<Option<PositionSnapshot>> {
        Ok(self.inner.lock().unwrap().get(symbol).cloned())
    }

    fn delete(&self, symbol: &str) -> anyhow::Result<()> {
        self.inner.lock().unwrap().remove(symbol);
        Ok(())
    }

    fn all(&self) -> anyhow::Result<Vec<PositionSnapshot>> {
        Ok(self.inner.lock().unwrap().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qe_schemas::{ExitReason, Symbol};

    fn sample_trade(symbol: &str) -> CompletedTrade {
        CompletedTrade {
            symbol: Symbol::new(symbol),
            side: qe_schemas::PositionSide::Long,
            qty: 10,
            entry_price_micros: 100_000_000,
            exit_price_micros: 103_000_000,
            entry_ts: 1,
            exit_ts: 2,
            realized_pnl_micros: 30_000_000,
            exit_reason: ExitReason::TargetReached,
            confidence_at_entry: 80.0,
            strategy: "mean_reversion".to_string(),
            initial_stop_price_micros: 98_000_000,
        }
    }

    fn sample_snapshot(symbol: &str) -> PositionSnapshot {
        PositionSnapshot {
            symbol: symbol.to_string(),
            side: "long".to_string(),
            qty: 10,
            entry_price_micros: 100_000_000,
            entry_ts: 1,
            highest_price_micros: 101_000_000,
            lowest_price_micros: 99_000_000,
            current_stop_price_micros: 98_000_000,
            initial_stop_price_micros: 98_000_000,
            take_profit_price_micros: 105_000_000,
            trailing_active: false,
            trailing_stop_price_micros: None,
            strategy: "mean_reversion".to_string(),
            confidence_at_entry: 80.0,
        }
    }

    #[test]
    fn jsonl_trade_log_round_trips_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlTradeLog::new(dir.path().join("trades.jsonl")).unwrap();
        log.append(&sample_trade("AAPL")).unwrap();
        log.append(&sample_trade("MSFT")).unwrap();
        let all = log.all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbol, Symbol::new("AAPL"));
        assert_eq!(all[1].symbol, Symbol::new("MSFT"));
    }

    #[test]
    fn jsonl_trade_log_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlTradeLog::new(dir.path().join("nope.jsonl")).unwrap();
        assert!(log.all().unwrap().is_empty());
    }

    #[test]
    fn jsonl_position_store_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlPositionSnapshotStore::new(dir.path()).unwrap();
        store.put("AAPL", &sample_snapshot("AAPL")).unwrap();
        assert_eq!(store.get("AAPL").unwrap(), Some(sample_snapshot("AAPL")));
        store.delete("AAPL").unwrap();
        assert_eq!(store.get("AAPL").unwrap(), None);
    }

    #[test]
    fn jsonl_position_store_all_lists_every_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlPositionSnapshotStore::new(dir.path()).unwrap();
        store.put("AAPL", &sample_snapshot("AAPL")).unwrap();
        store.put("MSFT", &sample_snapshot("MSFT")).unwrap();
        let mut symbols: Vec<_> = store.all().unwrap().into_iter().map(|s| s.symbol).collect();
        symbols.sort();
        assert_eq!(symbols, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn in_memory_stores_behave_like_the_file_backed_ones() {
        let log = InMemoryTradeLog::default();
        log.append(&sample_trade("AAPL")).unwrap();
        assert_eq!(log.all().unwrap().len(), 1);

        let store = InMemoryPositionSnapshotStore::default();
        store.put("AAPL", &sample_snapshot("AAPL")).unwrap();
        assert!(store.get("AAPL").unwrap().is_some());
        store.delete("AAPL").unwrap();
        assert!(store.get("AAPL").unwrap().is_none());
    }
}
