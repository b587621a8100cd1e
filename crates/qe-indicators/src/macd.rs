//! MACD: 12/26 EMA spread, smoothed by a 9-period signal EMA.

use crate::ema::calculate_ema;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd_line: f64,
    pub macd_signal: f64,
}

/// Most recent MACD line/signal pair for the standard 12/26/9 configuration.
/// `None` if there isn't enough data to seed both EMAs plus the 9-period
/// signal smoothing.
pub fn latest_macd(closes: &[f64]) -> Option<MacdValue> {
    let ema12 = calculate_ema(closes, 12);
    let ema26 = calculate_ema(closes, 26);
    if ema12.is_empty() || ema26.is_empty() {
        return None;
    }

    // ema26 starts later (needs 26 seed points) — align the two series on
    // the tail before taking the elementwise difference.
    let offset = ema12.len().checked_sub(ema26.len())?;
    let macd_series: Vec<f64> = ema26
        .iter()
        .enumerate()
        .map(|(i, &slow)| ema12[i + offset] - slow)
        .collect();

    let signal_series = calculate_ema(&macd_series, 9);
    let macd_line = *macd_series.last()?;
    let macd_signal = *signal_series.last()?;
    if !macd_line.is_finite() || !macd_signal.is_finite() {
        return None;
    }
    Some(MacdValue {
        macd_line,
        macd_signal,
    })
}
