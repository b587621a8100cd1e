//! Rolling session VWAP: volume-weighted average of the typical price
//! `(high + low + close) / 3` over every bar passed in (callers are
//! responsible for trimming the slice to the current session).

use qe_schemas::{Bar, MICROS_SCALE};

fn micros_to_f64(v: i64) -> f64 {
    v as f64 / MICROS_SCALE as f64
}

/// `None` if `bars` is empty or total volume is zero.
pub fn session_vwap(bars: &[Bar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }

    let mut pv_sum = 0.0_f64;
    let mut vol_sum = 0.0_f64;
    for bar in bars {
        let typical = (micros_to_f64(bar.high_micros)
            + micros_to_f64(bar.low_micros)
            + micros_to_f64(bar.close_micros))
            / 3.0;
        pv_sum += typical * bar.volume as f64;
        vol_sum += bar.volume as f64;
    }

    if vol_sum <= 0.0 {
        return None;
    }
    let vwap = pv_sum / vol_sum;
    vwap.is_finite().then_some(vwap)
}
