//! EOD report aggregation (C12).
//!
//! A pure function over the session's `CompletedTrade` log: no IO, no
//! formatting, no sink-specific shape. The same aggregation runs unchanged
//! against a live session's trade log or a historical log replayed for
//! backtesting.

use std::collections::BTreeMap;

use qe_schemas::CompletedTrade;
use serde::{Deserialize, Serialize};

const ET_OFFSET_SECS: i64 = 5 * 3600;

fn et_hour_of_day(ts: i64) -> u8 {
    (((ts - ET_OFFSET_SECS).rem_euclid(86_400)) / 3600) as u8
}

/// R-multiple for one trade: realized PnL divided by the dollar risk taken
/// at entry (`qty * |entry - initial_stop|`). `None` when the position had
/// no stop distance to divide by (e.g. a recovered orphan with no known
/// entry context).
fn r_multiple(trade: &CompletedTrade) -> Option<f64> {
    let risk_micros = (trade.qty as i128
        * (trade.entry_price_micros as i128 - trade.initial_stop_price_micros as i128).abs())
        as i128;
    if risk_micros <= 0 {
        return None;
    }
    Some(trade.realized_pnl_micros as f64 / risk_micros as f64)
}

/// Per-symbol row in the EOD report, matching the stable external schema:
/// `symbol, trades, wins, losses, winRatePct, netPnL, avgPnL, avgRMultiple,
/// avgHoldSec, maxDrawdown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate_pct: f64,
    pub net_pnl_micros: i64,
    pub avg_pnl_micros: i64,
    pub avg_r_multiple: f64,
    pub avg_hold_sec: i64,
    pub max_drawdown_micros: i64,
}

/// One (symbol, hour-of-day ET) bucket, for the supplementary intraday
/// timing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourBucketReport {
    pub symbol: String,
    pub hour_et: u8,
    pub trades: u32,
    pub net_pnl_micros: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EodReport {
    pub session_date: String,
    pub symbols: Vec<SymbolReport>,
    pub hour_buckets: Vec<HourBucketReport>,
}

/// Peak-to-trough decline of the cumulative PnL curve built from `trades`,
/// taken in the order given (callers pass trades already sorted by
/// `exit_ts`). Zero if the curve never dips below a prior peak.
fn max_drawdown_micros(trades: &[&CompletedTrade]) -> i64 {
    let mut cumulative: i64 = 0;
    let mut peak: i64 = 0;
    let mut worst: i64 = 0;
    for trade in trades {
        cumulative = cumulative.saturating_add(trade.realized_pnl_micros);
        peak = peak.max(cumulative);
        worst = worst.min(cumulative - peak);
    }
    worst.abs()
}

/// Builds the EOD report for one session's trade log. `trades` need not be
/// pre-sorted; this function sorts its own per-symbol working copies by
/// `exit_ts` before computing drawdown.
pub fn build_eod_report(session_date: impl Into<String>, trades: &[CompletedTrade]) -> EodReport {
    let mut by_symbol: BTreeMap<String, Vec<&CompletedTrade>> = BTreeMap::new();
    for trade in trades {
        by_symbol
            .entry(trade.symbol.as_str().to_string())
            .or_default()
            .push(trade);
    }

    let mut symbols = Vec::with_capacity(by_symbol.len());
    for (symbol, mut rows) in by_symbol {
        rows.sort_by_key(|t| t.exit_ts);

        let trade_count = rows.len() as u32;
        let wins = rows.iter().filter(|t| t.realized_pnl_micros > 0).count() as u32;
        let losses = rows.iter().filter(|t| t.realized_pnl_micros < 0).count() as u32;
        let net_pnl_micros: i64 = rows.iter().map(|t| t.realized_pnl_micros).sum();
        let avg_pnl_micros = net_pnl_micros / trade_count as i64;
        let win_rate_pct = if trade_count == 0 {
            0.0
        } else {
            wins as f64 / trade_count as f64 * 100.0
        };

        let r_multiples: Vec<f64> = rows.iter().filter_map(|t| r_multiple(t)).collect();
        let avg_r_multiple = if r_multiples.is_empty() {
            0.0
        } else {
            r_multiples.iter().sum::<f64>() / r_multiples.len() as f64
        };

        let total_hold_secs: i64 = rows.iter().map(|t| t.exit_ts - t.entry_ts).sum();
        let avg_hold_sec = total_hold_secs / trade_count as i64;

        symbols.push(SymbolReport {
            symbol,
            trades: trade_count,
            wins,
            losses,
            win_rate_pct,
            net_pnl_micros,
            avg_pnl_micros,
            avg_r_multiple,
            avg_hold_sec,
            max_drawdown_micros: max_drawdown_micros(&rows),
        });
    }

    let mut bucket_totals: BTreeMap<(String, u8), (u32, i64)> = BTreeMap::new();
    for trade in trades {
        let key = (trade.symbol.as_str().to_string(), et_hour_of_day(trade.exit_ts));
        let entry = bucket_totals.entry(key).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += trade.realized_pnl_micros;
    }
    let hour_buckets = bucket_totals
        .into_iter()
        .map(|((symbol, hour_et), (trades, net_pnl_micros))| HourBucketReport {
            symbol,
            hour_et,
            trades,
            net_pnl_micros,
        })
        .collect();

    EodReport {
        session_date: session_date.into(),
        symbols,
        hour_buckets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qe_schemas::{ExitReason, PositionSide, Symbol};

    fn trade(
        symbol: &str,
        entry_price: i64,
        exit_price: i64,
        qty: i64,
        initial_stop: i64,
        entry_ts: i64,
        exit_ts: i64,
        pnl: i64,
    ) -> CompletedTrade {
        CompletedTrade {
            symbol: Symbol::new(symbol),
            side: PositionSide::Long,
            qty,
            entry_price_micros: entry_price,
            exit_price_micros: exit_price,
            entry_ts,
            exit_ts,
            realized_pnl_micros: pnl,
            exit_reason: ExitReason::TargetReached,
            confidence_at_entry: 80.0,
            strategy: "mean_reversion".to_string(),
            initial_stop_price_micros: initial_stop,
        }
    }

    #[test]
    fn aggregates_wins_losses_and_net_pnl_per_symbol() {
        let trades = vec![
            trade("AAPL", 100_000_000, 103_000_000, 10, 98_000_000, 1_700_000_000, 1_700_000_600, 30_000_000),
            trade("AAPL", 100_000_000, 99_000_000, 10, 98_000_000, 1_700_001_000, 1_700_001_600, -10_000_000),
            trade("MSFT", 300_000_000, 310_000_000, 5, 295_000_000, 1_700_000_000, 1_700_003_600, 50_000_000),
        ];

        let report = build_eod_report("2026-07-27", &trades);
        assert_eq!(report.symbols.len(), 2);

        let aapl = report.symbols.iter().find(|s| s.symbol == "AAPL").unwrap();
        assert_eq!(aapl.trades, 2);
        assert_eq!(aapl.wins, 1);
        assert_eq!(aapl.losses, 1);
        assert_eq!(aapl.net_pnl_micros, 20_000_000);
        assert_eq!(aapl.avg_pnl_micros, 10_000_000);
        assert_eq!(aapl.win_rate_pct, 50.0);

        let msft = report.symbols.iter().find(|s| s.symbol == "MSFT").unwrap();
        assert_eq!(msft.trades, 1);
        assert_eq!(msft.wins, 1);
        assert_eq!(msft.net_pnl_micros, 50_000_000);
    }

    #[test]
    fn avg_r_multiple_divides_pnl_by_entry_risk() {
        // risk = qty * |entry - stop| = 10 * 2_000_000 = 20_000_000 micros;
        // pnl = 30_000_000 -> R = 1.5
        let trades = vec![trade(
            "AAPL", 100_000_000, 103_000_000, 10, 98_000_000, 1, 601, 30_000_000,
        )];
        let report = build_eod_report("2026-07-27", &trades);
        let aapl = &report.symbols[0];
        assert!((aapl.avg_r_multiple - 1.5).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown_tracks_peak_to_trough_decline() {
        // cumulative: +50, +20 (peak 50, drawdown 30), +40 (peak 50, dd 10)
        let trades = vec![
            trade("AAPL", 100_000_000, 100_000_000, 1, 98_000_000, 1, 100, 50_000_000),
            trade("AAPL", 100_000_000, 100_000_000, 1, 98_000_000, 200, 300, -30_000_000),
            trade("AAPL", 100_000_000, 100_000_000, 1, 98_000_000, 400, 500, 20_000_000),
        ];
        let report = build_eod_report("2026-07-27", &trades);
        assert_eq!(report.symbols[0].max_drawdown_micros, 30_000_000);
    }

    #[test]
    fn empty_trade_log_produces_an_empty_report() {
        let report = build_eod_report("2026-07-27", &[]);
        assert!(report.symbols.is_empty());
        assert!(report.hour_buckets.is_empty());
    }

    #[test]
    fn hour_buckets_group_by_symbol_and_exit_hour_et() {
        // 1_700_000_000 UTC is 2023-11-14 22:13:20 UTC -> 17:13:20 ET (hour 17)
        let trades = vec![trade(
            "AAPL", 100_000_000, 101_000_000, 1, 98_000_000, 1_699_999_000, 1_700_000_000, 1_000_000,
        )];
        let report = build_eod_report("2026-07-27", &trades);
        assert_eq!(report.hour_buckets.len(), 1);
        assert_eq!(report.hour_buckets[0].symbol, "AAPL");
        assert_eq!(report.hour_buckets[0].trades, 1);
    }
}
