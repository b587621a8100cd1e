//! Momentum over a fixed bar lookback: `(price_now - price_n_ago) / price_n_ago`.
//!
//! Strategy bars are 15-minute resolution, so 30-minute momentum looks back
//! 2 bars and 1-hour momentum looks back 4 bars.

use qe_schemas::{Bar, MICROS_SCALE};

pub const BARS_PER_30M: usize = 2;
pub const BARS_PER_1H: usize = 4;

fn micros_to_f64(v: i64) -> f64 {
    v as f64 / MICROS_SCALE as f64
}

/// `None` if fewer than `lookback_bars + 1` bars are available or the
/// reference price is zero.
pub fn momentum(bars: &[Bar], lookback_bars: usize) -> Option<f64> {
    if bars.len() < lookback_bars + 1 {
        return None;
    }
    let now = micros_to_f64(bars.last()?.close_micros);
    let then = micros_to_f64(bars[bars.len() - 1 - lookback_bars].close_micros);
    if then == 0.0 {
        return None;
    }
    let m = (now - then) / then;
    m.is_finite().then_some(m)
}

pub fn momentum_30m(bars: &[Bar]) -> Option<f64> {
    momentum(bars, BARS_PER_30M)
}

pub fn momentum_1h(bars: &[Bar]) -> Option<f64> {
    momentum(bars, BARS_PER_1H)
}
