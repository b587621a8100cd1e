//! Exponential Moving Average.
//!
//! `EMA_t = close_t * multiplier + EMA_{t-1} * (1 - multiplier)`,
//! `multiplier = 2 / (period + 1)`, seeded with the SMA of the first
//! `period` closes.

/// Full EMA series for `closes` at `period`. Empty if there isn't enough
/// data or `period == 0`. Element `i` of the result corresponds to close
/// index `period - 1 + i`.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let sma: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sma);

    let mut prev_ema = sma;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        result.push(ema);
        prev_ema = ema;
    }

    result
}

/// Most recent EMA value for `period`, or `None` on insufficient/non-finite
/// data.
pub fn latest_ema(closes: &[f64], period: usize) -> Option<f64> {
    calculate_ema(closes, period).last().copied()
}
