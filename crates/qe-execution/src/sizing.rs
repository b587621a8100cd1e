//! Entry sizing (C8) — deterministic share-count derivation for a new
//! position.
//!
//! `qty = floor(accountRiskPerTrade * equity / (entryPrice * stopPct)) *
//! positionSizeMultiplier`
//!
//! All money/price terms are micros-scaled `i64`; `accountRiskPerTrade`,
//! `stopPct`, and `positionSizeMultiplier` are plain `f64` fractions (e.g.
//! `0.01` for 1%), matching the convention used for policy multipliers in
//! `qe-policy`.

/// Computes the entry order quantity (whole shares, floored, never negative).
///
/// Returns `0` if `entry_price_micros` or `stop_pct` is non-positive — there
/// is no well-defined size when the stop distance collapses to zero.
pub fn size_entry_qty(
    account_risk_per_trade: f64,
    equity_micros: i64,
    entry_price_micros: i64,
    stop_pct: f64,
    position_size_multiplier: f64,
) -> i64 {
    if entry_price_micros <= 0 || stop_pct <= 0.0 || equity_micros <= 0 {
        return 0;
    }
    let risk_budget = account_risk_per_trade * equity_micros as f64;
    let per_share_risk = entry_price_micros as f64 * stop_pct;
    if per_share_risk <= 0.0 {
        return 0;
    }
    let raw_qty = (risk_budget / per_share_risk).floor();
    let sized = (raw_qty * position_size_multiplier).floor();
    if sized <= 0.0 {
        0
    } else {
        sized as i64
    }
}
