use qe_schemas::{Signal, SignalAction};

use crate::{Strategy, StrategyContext, StrategySpec};

const MIN_VOLUME_RATIO: f64 = 2.0;
const MIN_PRICE_MOVE: f64 = 0.008;
const CONFIRMATION_BARS: usize = 3;

/// Entries on a MACD line/signal cross confirmed by a sustained price move,
/// elevated volume, and EMA9/21 trend alignment.
#[derive(Default)]
pub struct MomentumScalpStrategy;

impl Strategy for MomentumScalpStrategy {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("momentum_scalp")
    }

    fn propose(&self, ctx: &StrategyContext) -> Option<Signal> {
        if ctx.open_position.is_some() {
            return None;
        }

        let snap = &ctx.snapshot;
        let ema9 = snap.ema9?;
        let ema21 = snap.ema21?;
        let volume_ratio = snap.volume_ratio()?;
        if volume_ratio < MIN_VOLUME_RATIO {
            return None;
        }

        let window = ctx.confirmation_window(CONFIRMATION_BARS + 1);
        if window.len() < CONFIRMATION_BARS + 1 {
            return None;
        }
        let oldest = window.first()?;
        let prev = &window[window.len() - 2];
        let cur = &window[window.len() - 1];

        let (prev_macd, prev_signal) = (prev.macd_line?, prev.macd_signal?);
        let (cur_macd, cur_signal) = (cur.macd_line?, cur.macd_signal?);
        if oldest.current_price <= 0.0 {
            return None;
        }
        let price_move = (cur.current_price - oldest.current_price) / oldest.current_price;

        let bullish_cross = prev_macd <= prev_signal && cur_macd > cur_signal;
        let bearish_cross = prev_macd >= prev_signal && cur_macd < cur_signal;

        let action = if bullish_cross && price_move >= MIN_PRICE_MOVE && ema9 > ema21 {
            SignalAction::Buy
        } else if bearish_cross && price_move <= -MIN_PRICE_MOVE && ema9 < ema21 {
            SignalAction::Short
        } else {
            return None;
        };

        let confidence = (65.0
            + ((price_move.abs() - MIN_PRICE_MOVE) * 1000.0).max(0.0).min(20.0)
            + ((volume_ratio - MIN_VOLUME_RATIO) * 8.0).max(0.0).min(15.0))
        .min(100.0);

        Some(Signal {
            symbol: snap.symbol.clone(),
            action,
            strategy: self.spec().name,
            proposed_qty: 0,
            limit_price_micros: None,
            rationale: format!(
                "macd cross, price_move={:.3}% over {CONFIRMATION_BARS} bars, volume_ratio={volume_ratio:.2}, ema9/21 aligned",
                price_move * 100.0
            ),
            strategy_confidence: confidence,
        })
    }
}
