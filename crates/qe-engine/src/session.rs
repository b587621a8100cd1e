//! Trading Engine scheduler (C11): owns session state and the cycle loop.
//!
//! ```text
//! while not shutdown:
//!   wait_until(nextOpen)
//!   on_wake()                         # position recovery
//!   while isTradingWindow(now):
//!     run_cycle() per symbol
//!     sleep_until(next_cycle_boundary)
//!   flatten_all_positions("session_end")
//!   emit_eod_report()
//!   wait_until(nextOpen)
//! ```
//!
//! The loop itself never awaits a broker call directly. Each tick fans the
//! market-data fetch (the only IO, step 1 of `run_cycle`) out to one task
//! per symbol over a `JoinSet`; the loop then runs the synchronous decide/
//! execute steps for whichever symbols answered, in the order they
//! completed, so a slow or timed-out symbol never stalls the others.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use qe_config::EngineConfig;
use qe_execution::gateway::{BrokerGateway, GateVerdicts};
use qe_execution::order_router::BrokerAdapter;
use qe_execution::{flatten_all, position_book, Side};
use qe_indicators::IndicatorService;
use qe_integrity::session::{is_trading_window, next_open, SessionConfig};
use qe_integrity::CalendarSpec;
use qe_marketdata::live::{MarketDataError, MarketDataProvider};
use qe_policy::PolicyTable;
use qe_portfolio::PositionStore;
use qe_reconcile::{
    check_start_gate, classify_positions, reconcile_tick, ArmStartGate, DriftAction, LocalSnapshot,
    OrderSnapshot,
};
use qe_risk::{RiskConfig, RiskState};
use qe_schemas::{EngineEvent, Symbol};
use qe_strategy::StrategyHost;
use uuid::Uuid;

use crate::account::AccountView;
use crate::broker_reads::PositionsView;
use crate::cycle::{fetch_cycle_inputs, run_cycle, CycleOutcome};
use crate::events::EventSink;
use crate::persistence::{PositionSnapshotStore, TradeLog};
use crate::recovery::{recover_open_positions, PolicyLookup};

impl PolicyLookup for PolicyTable {
    fn policy_for(&self, symbol: &str) -> qe_policy::SymbolPolicy {
        self.get(symbol)
    }
}

/// Everything a session needs that outlives a single cycle tick. Built once
/// at daemon/CLI startup and handed to [`run_session_forever`], or driven
/// session-by-session in tests.
pub struct SessionEngine<B: BrokerAdapter> {
    pub config: EngineConfig,
    pub policies: PolicyTable,
    pub risk_cfg: RiskConfig,
    pub calendar: CalendarSpec,
    pub session_cfg: SessionConfig,

    pub provider: Arc<dyn MarketDataProvider>,
    pub gateway: BrokerGateway<B>,
    pub positions_view: Box<dyn PositionsView>,

    /// Fail-closed integrity arm switch: boots `false`, flipped by an
    /// explicit operator action (the daemon's `/v1/integrity/arm` route).
    /// Read fresh every cycle, never cached, so a mid-session disarm takes
    /// effect on the very next tick.
    pub integrity_armed: Arc<AtomicBool>,

    pub account: Box<dyn AccountView>,
    pub risk_state: RiskState,
    pub position_store: PositionStore,
    pub indicators: IndicatorService,
    pub strategy_host: StrategyHost,

    pub snapshots: Box<dyn PositionSnapshotStore>,
    pub trade_log: Box<dyn TradeLog>,
    pub events: Box<dyn EventSink>,
    pub report_sink: Box<dyn qe_reporting::EodReportSink>,

    pub run_id: Uuid,
    cycle_id: u64,
}

impl<B: BrokerAdapter> SessionEngine<B> {
    /// Builds a fresh engine, starting at cycle zero. `cycle_id` is private
    /// to this module so callers (the daemon, the CLI, tests) go through
    /// here rather than a struct literal.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        policies: PolicyTable,
        risk_cfg: RiskConfig,
        calendar: CalendarSpec,
        session_cfg: SessionConfig,
        provider: Arc<dyn MarketDataProvider>,
        gateway: BrokerGateway<B>,
        positions_view: Box<dyn PositionsView>,
        integrity_armed: Arc<AtomicBool>,
        account: Box<dyn AccountView>,
        risk_state: RiskState,
        position_store: PositionStore,
        indicators: IndicatorService,
        strategy_host: StrategyHost,
        snapshots: Box<dyn PositionSnapshotStore>,
        trade_log: Box<dyn TradeLog>,
        events: Box<dyn EventSink>,
        report_sink: Box<dyn qe_reporting::EodReportSink>,
        run_id: Uuid,
    ) -> Self {
        Self {
            config,
            policies,
            risk_cfg,
            calendar,
            session_cfg,
            provider,
            gateway,
            positions_view,
            integrity_armed,
            account,
            risk_state,
            position_store,
            indicators,
            strategy_host,
            snapshots,
            trade_log,
            events,
            report_sink,
            run_id,
            cycle_id: 0,
        }
    }

    /// Runs the full session lifecycle once, starting at the current time:
    /// recovery, the cycle loop until the trading window closes, flatten,
    /// and a summary of what to hand to the EOD reporter.
    pub async fn run_one_session(&mut self, config_hash: &str) -> anyhow::Result<EodInputs> {
        self.on_wake().await?;

        let now = self.now();
        let (y, m, d) = qe_integrity::session::et_date(now);
        let session_date = format!("{y:04}-{m:02}-{d:02}");

        let _ = self.events.emit(
            self.run_id,
            EngineEvent::SessionStarted {
                session_date: session_date.clone(),
                config_hash: config_hash.to_string(),
            },
        );

        while is_trading_window(self.now(), &self.session_cfg) {
            self.run_all_symbols_once().await;
            tokio::time::sleep(Duration::from_secs(self.config.cycle_interval_seconds)).await;
        }

        self.flatten_session_end()?;

        let trades = self.trade_log.all()?;
        let _ = self.events.emit(
            self.run_id,
            EngineEvent::SessionEnded {
                session_date: session_date.clone(),
                trade_count: trades.len() as u64,
            },
        );

        let report = qe_reporting::build_eod_report(session_date.clone(), &trades);
        let _ = self.report_sink.write_report(&report);

        Ok(EodInputs {
            session_date,
            trades,
        })
    }

    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn day_id(&self) -> u32 {
        let (y, m, d) = qe_integrity::session::et_date(self.now());
        (y as u32) * 10_000 + (m as u32) * 100 + d as u32
    }

    fn reject_window_id(&self) -> u32 {
        (self.now() / 60) as u32
    }

    /// The engine's own belief about what is open, shaped the way
    /// `qe_reconcile` expects the "local" side of a comparison. Orders are
    /// left empty: this engine never leaves a resting order outstanding
    /// between cycles (every submit is a market order resolved same-cycle),
    /// so only the position book can actually drift from the broker.
    fn local_snapshot(&self) -> LocalSnapshot {
        let mut positions = BTreeMap::new();
        for p in self.position_store.open_positions() {
            let signed = match p.side {
                qe_schemas::PositionSide::Long => p.qty,
                qe_schemas::PositionSide::Short => -p.qty,
            };
            positions.insert(p.symbol.as_str().to_string(), signed);
        }
        LocalSnapshot {
            orders: BTreeMap::<String, OrderSnapshot>::new(),
            positions,
        }
    }

    /// Position Recovery (on-wake path, §4.11): reconstruct every broker-
    /// reported open position before the first cycle of the session runs.
    /// Also the mandatory reconcile-clean gate for session start — recovery
    /// only proceeds once the broker's snapshot agrees with ours.
    async fn on_wake(&mut self) -> anyhow::Result<()> {
        let local = self.local_snapshot();
        let broker = self.positions_view.broker_snapshot();
        if let ArmStartGate::Blocked { report } = check_start_gate(&local, &broker) {
            anyhow::bail!("reconcile blocked session start: {report:?}");
        }

        let positions = self.positions_view.positions();
        let mut current_prices = BTreeMap::new();
        for symbol in positions.keys() {
            if let Ok(q) = self.provider.get_last_quote(&Symbol::new(symbol)).await {
                current_prices.insert(
                    symbol.clone(),
                    (q * qe_schemas::MICROS_SCALE as f64).round() as i64,
                );
            }
        }

        let recovered = recover_open_positions(
            &mut self.position_store,
            self.positions_view.as_ref(),
            self.snapshots.as_ref(),
            &self.policies,
            &current_prices,
        )?;
        for symbol in recovered {
            let _ = self.events.emit(
                self.run_id,
                EngineEvent::OrphanRecovered {
                    symbol: Symbol::new(symbol),
                },
            );
        }
        Ok(())
    }

    /// One tick: fan the market-data fetch out across the watchlist, then
    /// run the synchronous decide/execute steps as each symbol's data
    /// arrives. A periodic reconcile tick gates every cycle's `GateVerdicts`.
    async fn run_all_symbols_once(&mut self) {
        let local = self.local_snapshot();
        let broker = self.positions_view.broker_snapshot();

        // Phantom detection (§7, testable property 8, scenario S5): a
        // symbol this store believes open but the broker does not is
        // deleted outright, never closed with an order.
        let diff = classify_positions(&local.positions, &broker.positions);
        for phantom in diff.phantoms() {
            if let qe_reconcile::PositionDiscrepancy::Phantom { symbol, .. } = phantom {
                if self.position_store.remove_phantom(symbol).is_some() {
                    let _ = self.events.emit(
                        self.run_id,
                        EngineEvent::PhantomDetected {
                            symbol: Symbol::new(symbol),
                        },
                    );
                }
            }
        }

        // Re-snapshot after phantom cleanup: a phantom that was just
        // deleted should not also trip the drift-halt check below.
        let local = self.local_snapshot();
        let reconcile_clean = matches!(reconcile_tick(&local, &broker), DriftAction::Continue);

        let now_ts = self.now();
        let day_id = self.day_id();
        let reject_window_id = self.reject_window_id();
        self.cycle_id += 1;
        let cycle_id = self.cycle_id;
        let integrity_armed = self.integrity_armed.load(Ordering::SeqCst);

        let mut join_set = tokio::task::JoinSet::new();
        for symbol in self.config.watchlist.clone() {
            let provider = Arc::clone(&self.provider);
            let data_timeout = Duration::from_secs(self.config.data_timeout_seconds);
            let max_retries = self.config.max_retries;
            join_set.spawn(async move {
                let sym = Symbol::new(&symbol);
                let outcome =
                    fetch_with_retry(provider.as_ref(), &sym, data_timeout, max_retries).await;
                (symbol, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let Ok((symbol, result)) = joined else { continue };
            let sym = Symbol::new(&symbol);

            match result {
                Ok(inputs) => {
                    let outcome = run_cycle(
                        &sym,
                        cycle_id,
                        now_ts,
                        self.calendar,
                        inputs,
                        &mut self.indicators,
                        &self.strategy_host,
                        &self.policies,
                        &mut self.position_store,
                        self.account.as_ref(),
                        &self.risk_cfg,
                        &mut self.risk_state,
                        self.config.risk.account_risk_per_trade,
                        day_id,
                        reject_window_id,
                        integrity_armed,
                        reconcile_clean,
                        &self.gateway,
                        self.snapshots.as_ref(),
                        self.events.as_ref(),
                        self.run_id,
                    );
                    if let CycleOutcome::ExitFilled { .. } = outcome {
                        if let Some(trade) = self.position_store.completed_trades().last() {
                            let _ = self.trade_log.append(trade);
                        }
                    }
                }
                Err(_) => {
                    // Transient data error exhausted its retries: this
                    // symbol's cycle is skipped, others proceed untouched.
                }
            }
        }
    }

    /// Session-end forced flatten (§4.11, §5 cancellation path): every open
    /// position is closed via a market order regardless of strategy state.
    fn flatten_session_end(&mut self) -> anyhow::Result<()> {
        let current = position_book(self.position_store.open_positions().map(|p| {
            let signed = match p.side {
                qe_schemas::PositionSide::Long => p.qty,
                qe_schemas::PositionSide::Short => -p.qty,
            };
            (p.symbol.as_str().to_string(), signed)
        }));
        let decision = flatten_all(&current);
        let verdicts = GateVerdicts::all_clear();
        let now_ts = self.now();

        for intent in &decision.intents {
            let hash = qe_execution::intent_id::intent_hash(&[&intent.symbol, "session_end"]);
            let order_id = qe_execution::intent_id::derive_intent_id(&intent.symbol, now_ts, hash);
            let req = qe_execution::order_router::BrokerSubmitRequest {
                order_id,
                symbol: intent.symbol.clone(),
                quantity: match intent.side {
                    Side::Buy => intent.qty as i32,
                    Side::Sell => -(intent.qty as i32),
                },
                order_type: "market".to_string(),
                limit_price: None,
                time_in_force: "day".to_string(),
            };
            if self.gateway.submit(req, &verdicts).is_ok() {
                let protective_stop_order_id = self
                    .position_store
                    .get(&intent.symbol)
                    .and_then(|p| p.protective_stop_order_id.clone());
                if let Ok(trade) = self.position_store.close_position(
                    &intent.symbol,
                    0,
                    now_ts,
                    qe_schemas::ExitReason::SessionEnd,
                ) {
                    if let Some(order_id) = protective_stop_order_id {
                        let _ = self.gateway.cancel(&order_id, &verdicts);
                    }
                    self.account.apply_realized_pnl(trade.realized_pnl_micros);
                    let _ = self.snapshots.delete(&intent.symbol);
                    let _ = self.trade_log.append(&trade);
                }
            }
        }
        Ok(())
    }
}

/// Fetches one symbol's cycle inputs with a timeout and bounded exponential
/// backoff — the §5 retry policy (default 3 attempts before the cycle for
/// that symbol is marked skipped).
async fn fetch_with_retry(
    provider: &dyn MarketDataProvider,
    symbol: &Symbol,
    data_timeout: Duration,
    max_retries: u32,
) -> Result<crate::cycle::CycleInputs, MarketDataError> {
    let mut attempt = 0;
    loop {
        let fetched =
            tokio::time::timeout(data_timeout, fetch_cycle_inputs(provider, symbol, 50, 900)).await;

        match fetched {
            Ok(Ok(inputs)) => return Ok(inputs),
            Ok(Err(e)) if attempt >= max_retries => return Err(e),
            Err(_) if attempt >= max_retries => {
                return Err(MarketDataError::ProviderUnavailable {
                    symbol: symbol.clone(),
                    reason: "timed out after max retries".to_string(),
                });
            }
            _ => {
                attempt += 1;
                let delay_ms = 100u64.saturating_mul(1 << attempt.min(6));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// EOD reporter (C12) input: one session's completed trades plus the date
/// they were traded under, ready to hand to `qe_reporting`.
pub struct EodInputs {
    pub session_date: String,
    pub trades: Vec<qe_schemas::CompletedTrade>,
}

/// Runs sessions back-to-back forever: wait for the next open, run one
/// session, repeat. The binary entry point (daemon/CLI) layers graceful
/// shutdown on top via `tokio::select!` against `tokio::signal::ctrl_c()`
/// racing this future.
pub async fn run_session_forever<B: BrokerAdapter>(
    mut engine: SessionEngine<B>,
    config_hash: String,
) -> anyhow::Result<()> {
    loop {
        let now = chrono::Utc::now().timestamp();
        let wait = next_open(now) - now;
        if wait > 0 {
            tokio::time::sleep(Duration::from_secs(wait as u64)).await;
        }
        engine.run_one_session(&config_hash).await?;
    }
}
