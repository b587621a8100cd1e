use qe_schemas::{Signal, SignalAction};

use crate::{Strategy, StrategyContext, StrategySpec};

const MAX_VWAP_DISTANCE: f64 = 0.0015;
const MIN_VOLUME_RATIO: f64 = 2.0;
const CONFIRMATION_BARS: usize = 3;

/// Entries when price holds tight to VWAP for several bars on elevated
/// volume — a continuation bounce off the session's volume-weighted average.
#[derive(Default)]
pub struct VwapBounceStrategy;

impl Strategy for VwapBounceStrategy {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("vwap_bounce")
    }

    fn propose(&self, ctx: &StrategyContext) -> Option<Signal> {
        if ctx.open_position.is_some() {
            return None;
        }

        let snap = &ctx.snapshot;
        let vwap = snap.vwap?;
        if vwap <= 0.0 {
            return None;
        }
        let distance = (snap.current_price - vwap).abs() / vwap;
        if distance > MAX_VWAP_DISTANCE {
            return None;
        }

        let volume_ratio = snap.volume_ratio()?;
        if volume_ratio < MIN_VOLUME_RATIO {
            return None;
        }

        let window = ctx.confirmation_window(CONFIRMATION_BARS);
        if window.len() < CONFIRMATION_BARS {
            return None;
        }

        let all_above = window
            .iter()
            .all(|s| s.vwap.is_some_and(|v| s.current_price > v));
        let all_below = window
            .iter()
            .all(|s| s.vwap.is_some_and(|v| s.current_price < v));

        let action = if all_above {
            SignalAction::Buy
        } else if all_below {
            SignalAction::Short
        } else {
            return None;
        };

        let confidence = (65.0
            + ((MAX_VWAP_DISTANCE - distance) * 1000.0).max(0.0).min(15.0)
            + ((volume_ratio - MIN_VOLUME_RATIO) * 8.0).max(0.0).min(20.0))
        .min(100.0);

        Some(Signal {
            symbol: snap.symbol.clone(),
            action,
            strategy: self.spec().name,
            proposed_qty: 0,
            limit_price_micros: None,
            rationale: format!(
                "price within {:.3}% of vwap, held {CONFIRMATION_BARS} bars, volume_ratio={volume_ratio:.2}",
                distance * 100.0
            ),
            strategy_confidence: confidence,
        })
    }
}
