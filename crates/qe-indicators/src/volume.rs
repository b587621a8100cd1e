//! Volume ratio: current bar volume over the 20-bar simple moving average
//! of volume.

use qe_schemas::Bar;

const WINDOW: usize = 20;

/// 20-bar simple moving average of volume. `None` if fewer than 20 bars are
/// available.
pub fn sma_volume(bars: &[Bar]) -> Option<f64> {
    if bars.len() < WINDOW {
        return None;
    }
    let window = &bars[bars.len() - WINDOW..];
    Some(window.iter().map(|b| b.volume as f64).sum::<f64>() / WINDOW as f64)
}

/// `None` if fewer than 20 bars are available or the average is zero.
pub fn volume_ratio(bars: &[Bar]) -> Option<f64> {
    let avg = sma_volume(bars)?;
    if avg <= 0.0 {
        return None;
    }
    let current = bars.last()?.volume as f64;
    let ratio = current / avg;
    ratio.is_finite().then_some(ratio)
}
