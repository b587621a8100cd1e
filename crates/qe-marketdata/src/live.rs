//! Market Data Provider (C3): the engine's only window onto bars and quotes.
//!
//! Expressed as an object-safe async trait so a live broker-backed provider
//! and a deterministic fixture-backed provider (tests, backtests) are
//! interchangeable without touching the caller. A thin per-symbol quality
//! check runs over every fetched bar sequence before it reaches the
//! Indicator Service; violations surface through the same error taxonomy as
//! a provider outage rather than a silent pass-through.

use std::collections::BTreeMap;

use qe_schemas::{Bar, Symbol};

/// Failure modes the caller (C11's scheduler) must propagate, never paper
/// over with a default snapshot or a stale price.
#[derive(Clone, Debug, PartialEq)]
pub enum MarketDataError {
    /// The newest bar available is older than `resolution_secs * 2`.
    StaleData {
        symbol: Symbol,
        newest_bar_ts: i64,
        now_ts: i64,
        resolution_secs: i64,
    },
    /// Fewer than `lookback` bars were returned.
    NoData {
        symbol: Symbol,
        requested: usize,
        got: usize,
    },
    /// The bar sequence failed the quality gate (duplicate timestamps,
    /// non-monotonic ordering, or a gap beyond the declared break).
    QualityViolation { symbol: Symbol, reason: String },
    /// Transport-level failure (network, deserialization, provider outage).
    ProviderUnavailable { symbol: Symbol, reason: String },
}

impl std::fmt::Display for MarketDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaleData { symbol, newest_bar_ts, now_ts, resolution_secs } => write!(
                f,
                "{symbol}: stale data, newest bar ts={newest_bar_ts} now={now_ts} resolution={resolution_secs}s"
            ),
            Self::NoData { symbol, requested, got } => {
                write!(f, "{symbol}: requested {requested} bars, got {got}")
            }
            Self::QualityViolation { symbol, reason } => {
                write!(f, "{symbol}: quality gate violation: {reason}")
            }
            Self::ProviderUnavailable { symbol, reason } => {
                write!(f, "{symbol}: provider unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for MarketDataError {}

/// `getBars` / `getLastQuote` contract. Resolution is caller-specified in
/// seconds (15-minute strategy bars in production); `lookback` is the number
/// of most-recent complete bars requested.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_bars(
        &self,
        symbol: &Symbol,
        lookback: usize,
        resolution_secs: i64,
    ) -> Result<Vec<Bar>, MarketDataError>;

    async fn get_last_quote(&self, symbol: &Symbol) -> Result<f64, MarketDataError>;
}

/// Runs the quality gate over a freshly fetched bar sequence: minimum count,
/// strictly increasing timestamps, no duplicates, and staleness relative to
/// `now_ts`. Called by every `MarketDataProvider` implementation before
/// returning bars to the caller.
pub fn quality_gate(
    symbol: &Symbol,
    bars: &[Bar],
    lookback: usize,
    resolution_secs: i64,
    now_ts: i64,
) -> Result<(), MarketDataError> {
    if bars.len() < lookback {
        return Err(MarketDataError::NoData {
            symbol: symbol.clone(),
            requested: lookback,
            got: bars.len(),
        });
    }

    for pair in bars.windows(2) {
        if pair[1].ts <= pair[0].ts {
            return Err(MarketDataError::QualityViolation {
                symbol: symbol.clone(),
                reason: format!("non-monotonic or duplicate bar ts {} -> {}", pair[0].ts, pair[1].ts),
            });
        }
    }

    if let Some(newest) = bars.last() {
        if now_ts - newest.ts > resolution_secs * 2 {
            return Err(MarketDataError::StaleData {
                symbol: symbol.clone(),
                newest_bar_ts: newest.ts,
                now_ts,
                resolution_secs,
            });
        }
    }

    Ok(())
}

/// Deterministic in-memory provider for tests and backtests: bars are
/// pre-loaded per symbol and `get_bars` returns the tail window, no wall
/// clock or network involved. `now_ts` is supplied by the caller so
/// staleness checks stay deterministic too.
#[derive(Clone, Debug, Default)]
pub struct FixtureMarketDataProvider {
    bars: BTreeMap<String, Vec<Bar>>,
    now_ts: i64,
}

impl FixtureMarketDataProvider {
    pub fn new(now_ts: i64) -> Self {
        Self { bars: BTreeMap::new(), now_ts }
    }

    pub fn seed(&mut self, symbol: &Symbol, bars: Vec<Bar>) {
        self.bars.insert(symbol.as_str().to_string(), bars);
    }

    pub fn set_now(&mut self, now_ts: i64) {
        self.now_ts = now_ts;
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for FixtureMarketDataProvider {
    async fn get_bars(
        &self,
        symbol: &Symbol,
        lookback: usize,
        resolution_secs: i64,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let all = self.bars.get(symbol.as_str()).cloned().unwrap_or_default();
        if all.len() < lookback {
            return Err(MarketDataError::NoData { symbol: symbol.clone(), requested: lookback, got: all.len() });
        }
        let tail: Vec<Bar> = all[all.len() - lookback..].to_vec();
        quality_gate(symbol, &tail, lookback, resolution_secs, self.now_ts)?;
        Ok(tail)
    }

    async fn get_last_quote(&self, symbol: &Symbol) -> Result<f64, MarketDataError> {
        self.bars
            .get(symbol.as_str())
            .and_then(|bars| bars.last())
            .map(|b| b.close_micros as f64 / qe_schemas::MICROS_SCALE as f64)
            .ok_or_else(|| MarketDataError::NoData { symbol: symbol.clone(), requested: 1, got: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(symbol: &Symbol, ts: i64, close: i64) -> Bar {
        Bar {
            symbol: symbol.clone(),
            ts,
            open_micros: close,
            high_micros: close,
            low_micros: close,
            close_micros: close,
            volume: 1000,
        }
    }

    #[tokio::test]
    async fn fixture_returns_the_tail_window() {
        let symbol = Symbol::new("AAPL");
        let mut provider = FixtureMarketDataProvider::new(300);
        provider.seed(&symbol, vec![bar(&symbol, 60, 100), bar(&symbol, 120, 101), bar(&symbol, 180, 102)]);
        let bars = provider.get_bars(&symbol, 2, 60).await.unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].ts, 120);
        assert_eq!(bars[1].ts, 180);
    }

    #[tokio::test]
    async fn insufficient_bars_is_no_data() {
        let symbol = Symbol::new("AAPL");
        let mut provider = FixtureMarketDataProvider::new(60);
        provider.seed(&symbol, vec![bar(&symbol, 60, 100)]);
        let err = provider.get_bars(&symbol, 5, 60).await.unwrap_err();
        assert!(matches!(err, MarketDataError::NoData { got: 1, requested: 5, .. }));
    }

    #[tokio::test]
    async fn stale_newest_bar_is_refused() {
        let symbol = Symbol::new("AAPL");
        let mut provider = FixtureMarketDataProvider::new(10_000);
        provider.seed(&symbol, vec![bar(&symbol, 60, 100), bar(&symbol, 120, 101)]);
        let err = provider.get_bars(&symbol, 2, 60).await.unwrap_err();
        assert!(matches!(err, MarketDataError::StaleData { .. }));
    }

    #[tokio::test]
    async fn last_quote_is_latest_close() {
        let symbol = Symbol::new("AAPL");
        let mut provider = FixtureMarketDataProvider::new(120);
        provider.seed(&symbol, vec![bar(&symbol, 60, 100_000_000), bar(&symbol, 120, 101_000_000)]);
        let quote = provider.get_last_quote(&symbol).await.unwrap();
        assert!((quote - 101.0).abs() < 1e-9);
    }

    #[test]
    fn quality_gate_rejects_duplicate_timestamps() {
        let symbol = Symbol::new("AAPL");
        let bars = vec![bar(&symbol, 60, 100), bar(&symbol, 60, 101)];
        let err = quality_gate(&symbol, &bars, 2, 60, 60).unwrap_err();
        assert!(matches!(err, MarketDataError::QualityViolation { .. }));
    }

    #[test]
    fn quality_gate_rejects_out_of_order_timestamps() {
        let symbol = Symbol::new("AAPL");
        let bars = vec![bar(&symbol, 120, 100), bar(&symbol, 60, 101)];
        let err = quality_gate(&symbol, &bars, 2, 60, 120).unwrap_err();
        assert!(matches!(err, MarketDataError::QualityViolation { .. }));
    }
}
