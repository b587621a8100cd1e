use qe_schemas::Signal;

use crate::{
    IntentMode, MeanReversionStrategy, MomentumScalpStrategy, ShadowMode, Strategy,
    StrategyContext, StrategyHostError, StrategyIntent, VwapBounceStrategy,
};

/// Holds every registered strategy and polls all of them each cycle.
///
/// Earlier single-strategy frameworks enforced "exactly one registered
/// strategy"; this host holds the full set because the engine runs three
/// strategies concurrently against the same symbol.
pub struct StrategyHost {
    strategies: Vec<Box<dyn Strategy>>,
    shadow: ShadowMode,
}

impl StrategyHost {
    pub fn new(shadow: ShadowMode) -> Self {
        Self {
            strategies: Vec::new(),
            shadow,
        }
    }

    pub fn shadow_mode(&self) -> ShadowMode {
        self.shadow
    }

    pub fn set_shadow_mode(&mut self, shadow: ShadowMode) {
        self.shadow = shadow;
    }

    pub fn register(&mut self, s: Box<dyn Strategy>) {
        self.strategies.push(s);
    }

    /// A host pre-loaded with every built-in strategy (momentum scalp, mean
    /// reversion, VWAP bounce), for callers that just want the engine's
    /// standard strategy set without hand-registering each one.
    pub fn with_default_strategies(shadow: ShadowMode) -> Self {
        let mut host = Self::new(shadow);
        host.register(Box::new(MomentumScalpStrategy));
        host.register(Box::new(MeanReversionStrategy));
        host.register(Box::new(VwapBounceStrategy));
        host
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn specs(&self) -> Vec<crate::StrategySpec> {
        self.strategies.iter().map(|s| s.spec()).collect()
    }

    /// Poll every registered strategy once against `ctx`, in registration
    /// order. Strategies below their own `min_confidence` emit nothing.
    pub fn poll(&self, ctx: &StrategyContext) -> Result<Vec<StrategyIntent>, StrategyHostError> {
        if self.strategies.is_empty() {
            return Err(StrategyHostError::NoStrategiesRegistered);
        }

        let mode = match self.shadow {
            ShadowMode::Off => IntentMode::Live,
            ShadowMode::On => IntentMode::Shadow,
        };

        let intents = self
            .strategies
            .iter()
            .filter_map(|s| {
                let signal = s.propose(ctx)?;
                if signal.strategy_confidence < s.min_confidence() {
                    return None;
                }
                Some(StrategyIntent {
                    spec: s.spec(),
                    mode,
                    signal,
                })
            })
            .collect();

        Ok(intents)
    }

    /// The single highest strategy-confidence candidate from this cycle's
    /// poll, if any strategy proposed one. The engine-level confidence gate
    /// and risk gate still run on this candidate before it can trade.
    pub fn best_candidate(&self, ctx: &StrategyContext) -> Result<Option<Signal>, StrategyHostError> {
        let intents = self.poll(ctx)?;
        Ok(intents
            .into_iter()
            .max_by(|a, b| {
                a.signal
                    .strategy_confidence
                    .partial_cmp(&b.signal.strategy_confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|i| i.signal)
    }
}
