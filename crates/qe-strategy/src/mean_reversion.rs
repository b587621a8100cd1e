use qe_schemas::{Signal, SignalAction};

use crate::{Strategy, StrategyContext, StrategySpec};

const RSI_OVERSOLD: f64 = 25.0;
const RSI_OVERBOUGHT: f64 = 75.0;
const MIN_VOLUME_RATIO: f64 = 1.8;

/// Entries against an RSI extreme confirmed by price trading outside its
/// Bollinger band and elevated volume.
#[derive(Default)]
pub struct MeanReversionStrategy;

impl Strategy for MeanReversionStrategy {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new("mean_reversion")
    }

    fn propose(&self, ctx: &StrategyContext) -> Option<Signal> {
        if ctx.open_position.is_some() {
            return None;
        }

        let snap = &ctx.snapshot;
        let rsi = snap.rsi?;
        let bb_upper = snap.bb_upper?;
        let bb_lower = snap.bb_lower?;
        let volume_ratio = snap.volume_ratio()?;

        if volume_ratio < MIN_VOLUME_RATIO {
            return None;
        }

        let (action, extreme_excess) = if rsi <= RSI_OVERSOLD && snap.current_price < bb_lower {
            (SignalAction::Buy, RSI_OVERSOLD - rsi)
        } else if rsi >= RSI_OVERBOUGHT && snap.current_price > bb_upper {
            (SignalAction::Short, rsi - RSI_OVERBOUGHT)
        } else {
            return None;
        };

        let confidence = (65.0
            + (extreme_excess * 1.2).min(20.0)
            + ((volume_ratio - MIN_VOLUME_RATIO) * 10.0).max(0.0).min(15.0))
        .min(100.0);

        Some(Signal {
            symbol: snap.symbol.clone(),
            action,
            strategy: self.spec().name,
            proposed_qty: 0,
            limit_price_micros: None,
            rationale: format!(
                "rsi={rsi:.1} outside [{RSI_OVERSOLD},{RSI_OVERBOUGHT}], price outside bollinger band, volume_ratio={volume_ratio:.2}"
            ),
            strategy_confidence: confidence,
        })
    }
}
