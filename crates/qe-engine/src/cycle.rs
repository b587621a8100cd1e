//! `run_cycle()`: the eight-step per-symbol decision loop (C11).
//!
//! Split in two to keep the only IO at the edges: [`fetch_cycle_inputs`]
//! does the one broker/market-data call a cycle needs (step 1, async);
//! [`run_cycle`] is the rest (steps 2-8) and touches nothing but in-memory
//! state and the gateway's synchronous, `RefCell`-backed paper broker.

use qe_execution::gateway::{BrokerGateway, GateVerdicts};
use qe_execution::intent_id::{derive_intent_id, intent_hash};
use qe_execution::order_router::{BrokerAdapter, BrokerSubmitRequest};
use qe_indicators::IndicatorService;
use qe_integrity::CalendarSpec;
use qe_marketdata::live::{MarketDataError, MarketDataProvider};
use qe_policy::SymbolPolicy;
use qe_portfolio::PositionStore;
use qe_risk::{evaluate as risk_evaluate, RequestKind, RiskConfig, RiskDecision, RiskState, RiskInput, TradeContext};
use qe_schemas::{
    Bar, ConfidenceResult, Direction, EngineEvent, ExitReason, Position, PositionSide,
    RejectReason, Signal, SignalAction, Symbol, MICROS_SCALE,
};
use qe_strategy::StrategyHost;
use qe_trailing::{PriceUpdate, TrailingConfig, TrailingDecision, TrailingState, TrailingStateKind};
use uuid::Uuid;

use crate::account::AccountView;
use crate::events::EventSink;
use crate::persistence::PositionSnapshot;
use crate::recovery::PolicyLookup;

/// Why a cycle produced no order for its symbol — not a failure, the spec's
/// "skipped, not failed" case.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleSkipReason {
    MarketData(String),
    InsufficientIndicatorData,
    NoCandidateSignal,
    ConfidenceRejected,
    RiskRejected(String),
    OutsideTradingWindow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Skipped(CycleSkipReason),
    ExitFilled { reason: ExitReason, realized_pnl_micros: i64 },
    EntryFilled { client_order_id: String, qty: i64 },
    NoAction,
}

/// Everything step 1 fetches for a symbol, handed to `run_cycle` untouched.
pub struct CycleInputs {
    pub bars: Vec<Bar>,
    pub quote: f64,
}

/// Step 1: fetch bars & quote. The only `await` in the whole cycle.
pub async fn fetch_cycle_inputs(
    provider: &dyn MarketDataProvider,
    symbol: &Symbol,
    lookback: usize,
    resolution_secs: i64,
) -> Result<CycleInputs, MarketDataError> {
    let bars = provider.get_bars(symbol, lookback, resolution_secs).await?;
    let quote = provider.get_last_quote(symbol).await?;
    Ok(CycleInputs { bars, quote })
}

#[allow(clippy::too_many_arguments)]
pub fn run_cycle<B: BrokerAdapter>(
    symbol: &Symbol,
    cycle_id: u64,
    now_ts: i64,
    calendar: CalendarSpec,
    inputs: CycleInputs,
    indicators: &mut IndicatorService,
    strategy_host: &StrategyHost,
    policies: &dyn PolicyLookup,
    position_store: &mut PositionStore,
    account: &dyn AccountView,
    risk_cfg: &RiskConfig,
    risk_state: &mut RiskState,
    account_risk_per_trade: f64,
    day_id: u32,
    reject_window_id: u32,
    integrity_armed: bool,
    reconcile_clean: bool,
    gateway: &BrokerGateway<B>,
    snapshots: &dyn crate::persistence::PositionSnapshotStore,
    events: &dyn EventSink,
    run_id: Uuid,
) -> CycleOutcome {
    let _ = events.emit(
        run_id,
        EngineEvent::CycleStarted {
            symbol: symbol.clone(),
            cycle_id,
        },
    );

    if !calendar.is_session_bar_end(now_ts) {
        return finish(
            events,
            run_id,
            symbol,
            cycle_id,
            CycleOutcome::Skipped(CycleSkipReason::OutsideTradingWindow),
        );
    }

    // Step 2: indicator snapshot.
    let snapshot = match indicators.snapshot(symbol, &inputs.bars) {
        Ok(s) => s,
        Err(_) => {
            return finish(
                events,
                run_id,
                symbol,
                cycle_id,
                CycleOutcome::Skipped(CycleSkipReason::InsufficientIndicatorData),
            );
        }
    };

    let policy = policies.policy_for(symbol.as_str());
    let current_price_micros = (inputs.quote * MICROS_SCALE as f64).round() as i64;

    // Step 3: update trailing stop for any open position on this symbol,
    // before considering new signals.
    if let Some(position) = position_store.get(symbol.as_str()).cloned() {
        let trail_cfg = TrailingConfig {
            side: position.side,
            trail_activation_pct_micros: policy.trail_activation_pct_micros,
            trail_distance_pct_micros: policy.trail_distance_pct_micros,
        };
        let mut tstate = position_to_trailing_state(&position);
        let decision = qe_trailing::evaluate(&trail_cfg, &mut tstate, PriceUpdate {
            price_micros: current_price_micros,
        });

        match decision {
            TrailingDecision::StopTriggered | TrailingDecision::TargetReached => {
                let reason = if decision == TrailingDecision::StopTriggered {
                    ExitReason::StopTriggered
                } else {
                    ExitReason::TargetReached
                };
                let _ = events.emit(
                    run_id,
                    EngineEvent::StopTriggered {
                        symbol: symbol.clone(),
                        price_micros: current_price_micros,
                    },
                );
                let verdicts = GateVerdicts { integrity_armed, risk_allowed: true, reconcile_clean };
                return finish(
                    events,
                    run_id,
                    symbol,
                    cycle_id,
                    close_position(
                        position_store, account, events, snapshots, risk_state, run_id, symbol,
                        current_price_micros, now_ts, reason, gateway, &verdicts,
                    ),
                );
            }
            TrailingDecision::TrailArmed { new_stop_price_micros } => {
                write_back_trailing(position_store, symbol, &tstate, new_stop_price_micros);
            }
            TrailingDecision::HoldStop => {
                write_back_trailing(position_store, symbol, &tstate, tstate.current_stop_price_micros);
            }
        }
    }

    // Step 5/6: ask every strategy for a candidate, keep only the best.
    let open_position = position_store.get(symbol.as_str()).cloned();
    let ctx = qe_strategy::StrategyContext::new(snapshot.clone(), policy.clone(), open_position.clone(), vec![snapshot.clone()]);
    let candidate = match strategy_host.best_candidate(&ctx) {
        Ok(Some(signal)) => signal,
        Ok(None) => {
            return finish(
                events,
                run_id,
                symbol,
                cycle_id,
                CycleOutcome::Skipped(CycleSkipReason::NoCandidateSignal),
            );
        }
        Err(_) => {
            return finish(
                events,
                run_id,
                symbol,
                cycle_id,
                CycleOutcome::Skipped(CycleSkipReason::NoCandidateSignal),
            );
        }
    };

    let _ = events.emit(
        run_id,
        EngineEvent::SignalProposed {
            symbol: symbol.clone(),
            strategy: candidate.strategy.clone(),
        },
    );

    let intended_direction = match candidate.action {
        SignalAction::Buy => Direction::Long,
        SignalAction::Short => Direction::Short,
        SignalAction::SellToClose | SignalAction::BuyToCover => Direction::Neutral,
    };

    let confidence: ConfidenceResult = qe_confidence::evaluate(&snapshot, &policy, intended_direction);
    if intended_direction != Direction::Neutral
        && !qe_confidence::should_execute(&confidence, intended_direction)
    {
        let _ = events.emit(
            run_id,
            EngineEvent::SignalRejected {
                symbol: symbol.clone(),
                reason: RejectReason::ConfidenceBelowThreshold,
            },
        );
        return finish(
            events,
            run_id,
            symbol,
            cycle_id,
            CycleOutcome::Skipped(CycleSkipReason::ConfidenceRejected),
        );
    }

    // Strategies propose direction only (`proposed_qty` is always 0 out of
    // C6) — size here, once, so the risk gate's notional check and the
    // order actually placed in step 8 agree on the same quantity.
    let entry_side = match candidate.action {
        SignalAction::Buy => Some(PositionSide::Long),
        SignalAction::Short => Some(PositionSide::Short),
        SignalAction::SellToClose | SignalAction::BuyToCover => None,
    };
    let (stop_price_micros, take_profit_price_micros, sized_entry_qty) = match entry_side {
        Some(side) => {
            let (stop, target) = stop_target_prices(side, current_price_micros, &policy);
            let qty = sized_qty(
                account.equity_micros(),
                account_risk_per_trade,
                current_price_micros,
                stop,
                &policy,
                risk_cfg.max_position_notional_micros,
            );
            (stop, target, qty)
        }
        None => (0, 0, 0),
    };

    // Step 7: risk gate.
    let notional_micros = sized_entry_qty * current_price_micros / MICROS_SCALE;
    let trade_ctx = TradeContext {
        notional_micros,
        is_short: matches!(candidate.action, SignalAction::Short),
    };
    let risk_input = RiskInput {
        day_id,
        equity_micros: account.equity_micros(),
        reject_window_id,
        request: RequestKind::NewOrder,
        is_risk_reducing: false,
        pdt: qe_risk::PdtContext::ok(),
        kill_switch: None,
        trade: Some(trade_ctx.clone()),
    };
    let decision: RiskDecision = risk_evaluate(risk_cfg, risk_state, &risk_input);
    if decision.action != qe_risk::RiskAction::Allow {
        risk_state.record_reject(reject_window_id);
        let _ = events.emit(
            run_id,
            EngineEvent::RiskLimitViolation {
                symbol: symbol.clone(),
                reason: RejectReason::MaxNotionalExceeded,
            },
        );
        return finish(
            events,
            run_id,
            symbol,
            cycle_id,
            CycleOutcome::Skipped(CycleSkipReason::RiskRejected(format!("{:?}", decision.reason))),
        );
    }

    // Step 8: place entry.
    let outcome = place_entry(
        symbol,
        now_ts,
        &candidate,
        current_price_micros,
        stop_price_micros,
        take_profit_price_micros,
        sized_entry_qty,
        integrity_armed,
        reconcile_clean,
        gateway,
        position_store,
        snapshots,
        risk_state,
        events,
        run_id,
    );

    finish(events, run_id, symbol, cycle_id, outcome)
}

fn finish(
    events: &dyn EventSink,
    run_id: Uuid,
    symbol: &Symbol,
    cycle_id: u64,
    outcome: CycleOutcome,
) -> CycleOutcome {
    let _ = events.emit(
        run_id,
        EngineEvent::CycleCompleted {
            symbol: symbol.clone(),
            cycle_id,
        },
    );
    outcome
}

fn position_to_trailing_state(position: &Position) -> TrailingState {
    TrailingState {
        kind: if position.trailing_active {
            TrailingStateKind::TrailingArmed
        } else {
            TrailingStateKind::Initial
        },
        entry_price_micros: position.entry_price_micros,
        highest_price_micros: position.highest_price_micros,
        lowest_price_micros: position.lowest_price_micros,
        current_stop_price_micros: position.current_stop_price_micros,
        take_profit_price_micros: position.take_profit_price_micros,
        trailing_stop_price_micros: position.trailing_stop_price_micros,
    }
}

fn write_back_trailing(
    store: &mut PositionStore,
    symbol: &Symbol,
    tstate: &TrailingState,
    new_stop_price_micros: i64,
) {
    if let Some(position) = store.get_mut(symbol.as_str()) {
        position.highest_price_micros = tstate.highest_price_micros;
        position.lowest_price_micros = tstate.lowest_price_micros;
        position.current_stop_price_micros = new_stop_price_micros;
        position.trailing_active = tstate.kind == TrailingStateKind::TrailingArmed;
        position.trailing_stop_price_micros = tstate.trailing_stop_price_micros;
    }
}

#[allow(clippy::too_many_arguments)]
fn close_position<B: BrokerAdapter>(
    store: &mut PositionStore,
    account: &dyn AccountView,
    events: &dyn EventSink,
    snapshots: &dyn crate::persistence::PositionSnapshotStore,
    risk_state: &mut RiskState,
    run_id: Uuid,
    symbol: &Symbol,
    exit_price_micros: i64,
    exit_ts: i64,
    reason: ExitReason,
    gateway: &BrokerGateway<B>,
    verdicts: &GateVerdicts,
) -> CycleOutcome {
    let protective_stop_order_id = store.get(symbol.as_str()).and_then(|p| p.protective_stop_order_id.clone());
    match store.close_position(symbol.as_str(), exit_price_micros, exit_ts, reason) {
        Ok(trade) => {
            if let Some(order_id) = protective_stop_order_id {
                let _ = gateway.cancel(&order_id, verdicts);
            }
            account.apply_realized_pnl(trade.realized_pnl_micros);
            let _ = snapshots.delete(symbol.as_str());
            let notional_micros = trade.qty * exit_price_micros / MICROS_SCALE;
            risk_state.record_position_closed(notional_micros, trade.side == PositionSide::Short);
            let _ = events.emit(
                run_id,
                EngineEvent::PositionClosed {
                    symbol: symbol.clone(),
                    reason,
                    realized_pnl_micros: trade.realized_pnl_micros,
                },
            );
            CycleOutcome::ExitFilled {
                reason,
                realized_pnl_micros: trade.realized_pnl_micros,
            }
        }
        Err(_) => CycleOutcome::NoAction,
    }
}

/// Stop-loss and take-profit prices for a new entry at `entry_price_micros`,
/// derived from the symbol policy's configured percentage offsets.
fn stop_target_prices(
    side: PositionSide,
    entry_price_micros: i64,
    policy: &SymbolPolicy,
) -> (i64, i64) {
    let stop_offset = (entry_price_micros as i128 * policy.stop_pct_micros as i128
        / MICROS_SCALE as i128) as i64;
    let target_offset = (entry_price_micros as i128 * policy.target_pct_micros as i128
        / MICROS_SCALE as i128) as i64;
    match side {
        PositionSide::Long => (entry_price_micros - stop_offset, entry_price_micros + target_offset),
        PositionSide::Short => (entry_price_micros + stop_offset, entry_price_micros - target_offset),
    }
}

/// Risk-sized quantity for a new entry: `equity * account_risk_per_trade /
/// stop_distance`, scaled by the symbol's position-size multiplier, never
/// exceeding the configured per-trade notional cap.
fn sized_qty(
    equity_micros: i64,
    account_risk_per_trade: f64,
    entry_price_micros: i64,
    stop_price_micros: i64,
    policy: &SymbolPolicy,
    max_notional_micros: i64,
) -> i64 {
    let stop_distance = (entry_price_micros - stop_price_micros).abs().max(1);
    let risk_budget_micros = (equity_micros as f64 * account_risk_per_trade) as i64;
    let raw_qty = (risk_budget_micros as i128 * MICROS_SCALE as i128 / stop_distance as i128) as i64;
    let sized = ((raw_qty as f64) * policy.position_size_multiplier) as i64;
    let notional_capped_qty = (max_notional_micros as i128 * MICROS_SCALE as i128
        / entry_price_micros.max(1) as i128) as i64;
    sized.clamp(0, notional_capped_qty).max(0)
}

#[allow(clippy::too_many_arguments)]
fn place_entry<B: BrokerAdapter>(
    symbol: &Symbol,
    now_ts: i64,
    signal: &Signal,
    current_price_micros: i64,
    stop_price_micros: i64,
    take_profit_price_micros: i64,
    qty: i64,
    integrity_armed: bool,
    reconcile_clean: bool,
    gateway: &BrokerGateway<B>,
    position_store: &mut PositionStore,
    snapshots: &dyn crate::persistence::PositionSnapshotStore,
    risk_state: &mut RiskState,
    events: &dyn EventSink,
    run_id: Uuid,
) -> CycleOutcome {
    let side = match signal.action {
        SignalAction::Buy => PositionSide::Long,
        SignalAction::Short => PositionSide::Short,
        _ => return CycleOutcome::NoAction,
    };

    // The strategy set proposes direction only (`proposed_qty` is always 0
    // coming out of C6); sizing happened once, in `run_cycle`, before the
    // risk gate, so the quantity it checked and the quantity submitted here
    // agree.
    if qty == 0 {
        return CycleOutcome::NoAction;
    }

    let quantity_signed: i32 = match side {
        PositionSide::Long => qty as i32,
        PositionSide::Short => -(qty as i32),
    };

    let now_ts_str = now_ts.to_string();
    let hash = intent_hash(&[symbol.as_str(), now_ts_str.as_str(), signal.strategy.as_str()]);
    let client_order_id = derive_intent_id(symbol.as_str(), now_ts, hash);

    let req = BrokerSubmitRequest {
        order_id: client_order_id.clone(),
        symbol: symbol.as_str().to_string(),
        quantity: quantity_signed,
        order_type: "market".to_string(),
        limit_price: None,
        time_in_force: "day".to_string(),
    };

    let verdicts = GateVerdicts {
        integrity_armed,
        risk_allowed: true,
        reconcile_clean,
    };

    match gateway.submit(req, &verdicts) {
        Ok(_resp) => {
            let protective_stop_order_id =
                place_protective_stop(symbol, now_ts, side, qty, stop_price_micros, gateway, &verdicts);
            let position = Position {
                symbol: symbol.clone(),
                side,
                qty,
                entry_price_micros: current_price_micros,
                entry_ts: now_ts,
                highest_price_micros: current_price_micros,
                lowest_price_micros: current_price_micros,
                current_stop_price_micros: stop_price_micros,
                initial_stop_price_micros: stop_price_micros,
                take_profit_price_micros,
                trailing_active: false,
                trailing_stop_price_micros: None,
                strategy: signal.strategy.clone(),
                confidence_at_entry: signal.strategy_confidence,
                protective_stop_order_id,
            };
            if position_store.open_position(position.clone()).is_ok() {
                let _ = snapshots.put(symbol.as_str(), &PositionSnapshot::from(&position));
                let notional_micros = qty * current_price_micros / MICROS_SCALE;
                risk_state.record_position_opened(notional_micros, side == PositionSide::Short);
                let _ = events.emit(
                    run_id,
                    EngineEvent::OrderSubmitted {
                        symbol: symbol.clone(),
                        client_order_id: client_order_id.clone(),
                    },
                );
                let _ = events.emit(
                    run_id,
                    EngineEvent::OrderFilled {
                        symbol: symbol.clone(),
                        client_order_id: client_order_id.clone(),
                        qty,
                    },
                );
                CycleOutcome::EntryFilled {
                    client_order_id,
                    qty,
                }
            } else {
                CycleOutcome::NoAction
            }
        }
        Err(e) => {
            let _ = events.emit(
                run_id,
                EngineEvent::OrderFailed {
                    symbol: symbol.clone(),
                    client_order_id,
                    reason: e.to_string(),
                },
            );
            CycleOutcome::NoAction
        }
    }
}

/// Places the resting protective stop order at `stop_price_micros` on fill
/// (§4.8 `placeProtectiveStop`): a sell-stop for a long, a buy-to-cover stop
/// for a short. Returns its internal order id on success, `None` if the
/// gateway refused — the position is still opened either way, since the
/// in-engine trailing evaluation also catches a pierced stop on the next
/// cycle; losing the resting order costs latency, not the protection itself.
fn place_protective_stop<B: BrokerAdapter>(
    symbol: &Symbol,
    now_ts: i64,
    side: PositionSide,
    qty: i64,
    stop_price_micros: i64,
    gateway: &BrokerGateway<B>,
    verdicts: &GateVerdicts,
) -> Option<String> {
    let stop_price = stop_price_micros as f64 / MICROS_SCALE as f64;
    let now_ts_str = now_ts.to_string();
    let hash = intent_hash(&[symbol.as_str(), now_ts_str.as_str(), "protective_stop"]);
    let order_id = derive_intent_id(symbol.as_str(), now_ts, hash);

    // Closing order: opposite sign from the entry.
    let quantity_signed: i32 = match side {
        PositionSide::Long => -(qty as i32),
        PositionSide::Short => qty as i32,
    };

    let req = BrokerSubmitRequest {
        order_id: order_id.clone(),
        symbol: symbol.as_str().to_string(),
        quantity: quantity_signed,
        order_type: "stop".to_string(),
        limit_price: Some(stop_price),
        time_in_force: "day".to_string(),
    };

    gateway.submit(req, verdicts).ok().map(|_| order_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sized_qty_respects_notional_cap() {
        let policy = SymbolPolicy::default_policy();
        let qty = sized_qty(
            100_000_000_000, // $100,000 equity
            0.01,
            100_000_000, // $100 entry
            98_500_000,  // 1.5% stop
            &policy,
            10_000_000_000, // $10,000 max notional
        );
        assert!(qty > 0);
        let notional = qty * 100;
        assert!(notional <= 10_000_000_000_000 / MICROS_SCALE);
    }

    #[test]
    fn sized_qty_is_zero_when_stop_equals_entry() {
        let policy = SymbolPolicy::default_policy();
        let qty = sized_qty(100_000_000_000, 0.01, 100_000_000, 100_000_000, &policy, i64::MAX);
        assert!(qty >= 0);
    }
}
