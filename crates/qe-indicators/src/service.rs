//! Indicator Service (C4): the thin orchestration layer that turns a bar
//! slice into one `IndicatorSnapshot` per (symbol, cycle), computed once and
//! shared across the Confidence Engine, the strategy set, and monitoring.
//!
//! Each indicator itself is a free pure function over `&[Bar]` (see
//! `ema`/`rsi`/`bollinger`/`vwap`/`volume`/`momentum`), independently
//! unit-testable against hand-computed reference values. This module's only
//! job is to call each one once and assemble the result, plus own the
//! per-symbol cache keyed by `(symbol, latest_bar_ts)`.

use std::collections::HashMap;
use std::fmt;

use qe_schemas::{Bar, IndicatorSnapshot, MICROS_SCALE, Symbol};

use crate::{bollinger, ema, macd, momentum, rsi, volume, vwap};

/// Minimum bar count required to compute a snapshot at all. Below this, the
/// whole cycle for the symbol must be rejected, not given a partial score.
pub const MIN_BARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientDataError {
    pub symbol: Symbol,
    pub bars_available: usize,
    pub bars_required: usize,
}

impl fmt::Display for InsufficientDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient data for {}: {} bars available, {} required",
            self.symbol, self.bars_available, self.bars_required
        )
    }
}

impl std::error::Error for InsufficientDataError {}

fn micros_to_f64(v: i64) -> f64 {
    v as f64 / MICROS_SCALE as f64
}

/// Computes the indicator snapshot for one symbol's ordered bar history.
/// `bars` must already be quality-checked (no gaps/duplicates) by the
/// Market Data Provider; this function does not re-validate ordering.
fn compute_snapshot(symbol: &Symbol, bars: &[Bar]) -> Result<IndicatorSnapshot, InsufficientDataError> {
    if bars.len() < MIN_BARS {
        return Err(InsufficientDataError {
            symbol: symbol.clone(),
            bars_available: bars.len(),
            bars_required: MIN_BARS,
        });
    }

    let closes: Vec<f64> = bars.iter().map(|b| micros_to_f64(b.close_micros)).collect();
    let last = bars.last().expect("checked non-empty above");

    let macd = macd::latest_macd(&closes);
    let bb = bollinger::calculate_bollinger(&closes, 20, 2.0);

    Ok(IndicatorSnapshot {
        symbol: symbol.clone(),
        ts: last.ts,
        macd_line: macd.map(|v| v.macd_line),
        macd_signal: macd.map(|v| v.macd_signal),
        ema9: ema::latest_ema(&closes, 9),
        ema21: ema::latest_ema(&closes, 21),
        rsi: rsi::latest_rsi(&closes, 14),
        vwap: vwap::session_vwap(bars),
        bb_upper: bb.map(|v| v.upper),
        bb_lower: bb.map(|v| v.lower),
        volume: last.volume as f64,
        avg_volume: volume::sma_volume(bars),
        current_price: micros_to_f64(last.close_micros),
        momentum_30m: momentum::momentum_30m(bars),
        momentum_1h: momentum::momentum_1h(bars),
    })
}

/// Per-symbol cache: a snapshot is reused as long as the latest bar
/// timestamp hasn't advanced, so repeated reads within a cycle are free.
#[derive(Default)]
pub struct IndicatorService {
    cache: HashMap<Symbol, (i64, IndicatorSnapshot)>,
}

impl IndicatorService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached snapshot if its bar timestamp matches the newest
    /// bar in `bars`; otherwise recomputes and caches the new one.
    pub fn snapshot(
        &mut self,
        symbol: &Symbol,
        bars: &[Bar],
    ) -> Result<IndicatorSnapshot, InsufficientDataError> {
        let latest_ts = bars.last().map(|b| b.ts).unwrap_or(0);
        if let Some((cached_ts, snap)) = self.cache.get(symbol) {
            if *cached_ts == latest_ts {
                return Ok(snap.clone());
            }
        }
        let snap = compute_snapshot(symbol, bars)?;
        self.cache.insert(symbol.clone(), (latest_ts, snap.clone()));
        Ok(snap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64, volume: i64) -> Bar {
        let close_micros = (close * MICROS_SCALE as f64) as i64;
        Bar {
            symbol: Symbol::new("TEST"),
            ts,
            open_micros: close_micros,
            high_micros: close_micros + 10_000,
            low_micros: close_micros - 10_000,
            close_micros,
            volume,
        }
    }

    fn sample_bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| bar(i as i64 * 900, 100.0 + i as f64 * 0.1, 1000 + (i as i64 % 5) * 10))
            .collect()
    }

    #[test]
    fn insufficient_bars_errors() {
        let symbol = Symbol::new("TEST");
        let bars = sample_bars(10);
        let err = compute_snapshot(&symbol, &bars).unwrap_err();
        assert_eq!(err.bars_available, 10);
        assert_eq!(err.bars_required, MIN_BARS);
    }

    #[test]
    fn sufficient_bars_computes_full_snapshot() {
        let symbol = Symbol::new("TEST");
        let bars = sample_bars(120);
        let snap = compute_snapshot(&symbol, &bars).unwrap();
        assert!(snap.is_complete(), "snapshot should be fully populated: {snap:?}");
    }

    #[test]
    fn cache_reuses_snapshot_for_same_latest_ts() {
        let mut svc = IndicatorService::new();
        let symbol = Symbol::new("TEST");
        let bars = sample_bars(120);
        let first = svc.snapshot(&symbol, &bars).unwrap();
        let second = svc.snapshot(&symbol, &bars).unwrap();
        assert_eq!(first.ts, second.ts);
    }
}
