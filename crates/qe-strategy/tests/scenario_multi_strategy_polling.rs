use qe_policy::SymbolPolicy;
use qe_schemas::{IndicatorSnapshot, Signal, SignalAction, Symbol};
use qe_strategy::*;

struct FixedConfidence {
    name: &'static str,
    confidence: f64,
}

impl Strategy for FixedConfidence {
    fn spec(&self) -> StrategySpec {
        StrategySpec::new(self.name)
    }

    fn propose(&self, ctx: &StrategyContext) -> Option<Signal> {
        Some(Signal {
            symbol: ctx.snapshot.symbol.clone(),
            action: SignalAction::Buy,
            strategy: self.name.to_string(),
            proposed_qty: 1,
            limit_price_micros: None,
            rationale: "fixed".to_string(),
            strategy_confidence: self.confidence,
        })
    }
}

fn snapshot() -> IndicatorSnapshot {
    IndicatorSnapshot {
        symbol: Symbol::new("SPY"),
        ts: 1000,
        macd_line: Some(0.0),
        macd_signal: Some(0.0),
        ema9: Some(100.0),
        ema21: Some(100.0),
        rsi: Some(50.0),
        vwap: Some(100.0),
        bb_upper: Some(102.0),
        bb_lower: Some(98.0),
        volume: 100.0,
        avg_volume: Some(100.0),
        current_price: 100.0,
        momentum_30m: Some(0.0),
        momentum_1h: Some(0.0),
    }
}

fn ctx() -> StrategyContext {
    StrategyContext::new(snapshot(), SymbolPolicy::default_policy(), None, vec![snapshot()])
}

/// Earlier single-strategy frameworks rejected a second `register` call.
/// That restriction is gone: the host runs every registered strategy
/// concurrently.
#[test]
fn scenario_multi_strategy_polling() {
    let mut host = StrategyHost::new(ShadowMode::Off);
    host.register(Box::new(FixedConfidence { name: "alpha", confidence: 70.0 }));
    host.register(Box::new(FixedConfidence { name: "beta", confidence: 85.0 }));
    host.register(Box::new(FixedConfidence { name: "gamma", confidence: 66.0 }));

    assert_eq!(host.len(), 3);

    let intents = host.poll(&ctx()).unwrap();
    assert_eq!(intents.len(), 3);

    let names: Vec<&str> = intents.iter().map(|i| i.spec.name.as_str()).collect();
    assert_eq!(names, ["alpha", "beta", "gamma"]);
}

#[test]
fn best_candidate_picks_the_highest_confidence_proposal() {
    let mut host = StrategyHost::new(ShadowMode::Off);
    host.register(Box::new(FixedConfidence { name: "alpha", confidence: 70.0 }));
    host.register(Box::new(FixedConfidence { name: "beta", confidence: 85.0 }));
    host.register(Box::new(FixedConfidence { name: "gamma", confidence: 66.0 }));

    let best = host.best_candidate(&ctx()).unwrap().unwrap();
    assert_eq!(best.strategy, "beta");
}

#[test]
fn empty_host_errors_on_poll() {
    let host = StrategyHost::new(ShadowMode::Off);
    let err = host.poll(&ctx());
    assert_eq!(err, Err(StrategyHostError::NoStrategiesRegistered));
}
