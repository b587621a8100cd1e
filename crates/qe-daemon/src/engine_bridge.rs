//! Wires a [`qe_engine::SessionEngine`] to the daemon's control plane and
//! drives it to completion.
//!
//! `SharedPaperBroker` wraps its broker in an `Rc`, so `SessionEngine<
//! SharedPaperBroker>` is `!Send` — it cannot be `tokio::spawn`ed onto the
//! server's multi-threaded runtime. [`spawn_session_thread`] instead runs
//! it on a dedicated OS thread with its own single-threaded `tokio`
//! runtime, sharing only `Send + Sync` primitives (the operator arm switch,
//! the SSE bus) with the HTTP server thread.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use qe_config::EngineConfig;
use qe_engine::{
    AuditEventSink, EventSink, JsonlPositionSnapshotStore, JsonlTradeLog, PaperAccount,
    PaperPositionsView, SessionEngine, SharedPaperBroker,
};
use qe_execution::gateway::BrokerGateway;
use qe_indicators::IndicatorService;
use qe_integrity::session::SessionConfig;
use qe_integrity::CalendarSpec;
use qe_marketdata::live::FixtureMarketDataProvider;
use qe_policy::PolicyTable;
use qe_reporting::NoopReportSink;
use qe_risk::{RiskConfig, RiskState};
use qe_schemas::{EngineEvent, MICROS_SCALE};
use qe_strategy::{ShadowMode, StrategyHost};
use uuid::Uuid;

use crate::state::BusMsg;

/// Starting equity for the in-memory paper account. There is no live broker
/// to read a real balance from (a real broker client is out of scope), so
/// every run starts here; `--starting-equity` style overrides are left to
/// a future operator-facing config surface.
const STARTING_EQUITY_MICROS: i64 = 100_000 * MICROS_SCALE;

/// Data directory under which the daemon keeps its position snapshots,
/// trade log, and hash-chained audit log. Overridable for tests.
fn data_dir() -> std::path::PathBuf {
    std::env::var("QE_DAEMON_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("./data"))
}

/// A small built-in watchlist used when no `QE_DAEMON_CONFIG` file is
/// supplied, so the daemon boots and runs end to end without requiring an
/// operator to hand-author YAML first.
fn default_engine_config() -> EngineConfig {
    let json = serde_json::json!({ "watchlist": ["AAPL", "MSFT", "NVDA"] });
    EngineConfig::from_json(&json).expect("built-in default config must validate")
}

fn load_engine_config() -> anyhow::Result<EngineConfig> {
    match std::env::var("QE_DAEMON_CONFIG") {
        Ok(path) => {
            let loaded = qe_config::load_layered_yaml(&[path.as_str()])?;
            Ok(EngineConfig::from_json(&loaded.config_json)?)
        }
        Err(_) => Ok(default_engine_config()),
    }
}

/// Bridges every emitted [`EngineEvent`] to both the durable audit trail
/// (via [`AuditEventSink`]) and the daemon's SSE bus, so an operator
/// watching `/v1/stream` sees the same story the audit log will later
/// prove happened.
struct BusEventSink {
    bus: tokio::sync::broadcast::Sender<BusMsg>,
    inner: AuditEventSink,
}

impl EventSink for BusEventSink {
    fn emit(&self, run_id: Uuid, event: EngineEvent) -> anyhow::Result<()> {
        self.inner.emit(run_id, event.clone())?;
        let _ = self.bus.send(BusMsg::LogLine {
            level: "INFO".to_string(),
            msg: format!("{event:?}"),
        });
        Ok(())
    }
}

/// Builds one [`SessionEngine`] over a fresh in-process paper broker. The
/// only concrete `MarketDataProvider` in the workspace is the fixture
/// provider — a real broker/feed client is out of scope — so every symbol
/// in the watchlist starts with no seeded bars until something feeds it.
fn build_engine(
    armed: Arc<AtomicBool>,
    bus: tokio::sync::broadcast::Sender<BusMsg>,
) -> anyhow::Result<(SessionEngine<SharedPaperBroker>, String)> {
    let config = load_engine_config()?;
    let config_json = serde_json::to_value(&config)?;
    let config_hash = {
        let canonical = serde_json::to_string(&config_json)?;
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(canonical.as_bytes()))
    };

    let resolved_policies = qe_config::resolve_symbol_policies(&config.symbol_policies)
        .map_err(|e| anyhow::anyhow!("config rejected: {e}"))?;
    let policies = PolicyTable::build(resolved_policies)
        .map_err(|e| anyhow::anyhow!("policy table rejected: {e}"))?;

    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;

    let broker = SharedPaperBroker::new();
    let gateway = BrokerGateway::new(broker.clone());
    let positions_view = Box::new(PaperPositionsView::new(broker));

    let audit_writer = qe_audit::AuditWriter::new(dir.join("audit.jsonl"), true)?;
    let events = Box::new(BusEventSink {
        bus,
        inner: AuditEventSink::new(audit_writer),
    });

    let engine = SessionEngine::new(
        config,
        policies,
        RiskConfig::sane_defaults(),
        CalendarSpec::NyseWeekdays,
        SessionConfig::default(),
        Arc::new(FixtureMarketDataProvider::new(chrono::Utc::now().timestamp())),
        gateway,
        positions_view,
        armed,
        Box::new(PaperAccount::new(STARTING_EQUITY_MICROS)),
        RiskState::new(0, STARTING_EQUITY_MICROS, 0),
        qe_portfolio::PositionStore::new(),
        IndicatorService::new(),
        StrategyHost::with_default_strategies(ShadowMode::Off),
        Box::new(JsonlPositionSnapshotStore::new(dir.join("positions"))?),
        Box::new(JsonlTradeLog::new(dir.join("trades.jsonl"))?),
        events,
        Box::new(NoopReportSink),
        Uuid::new_v4(),
    );

    Ok((engine, config_hash))
}

/// Spawns the session scheduler on a dedicated OS thread with its own
/// single-threaded `tokio` runtime. Returns immediately; the engine logs
/// through the bus for as long as the process runs. There is no graceful
/// stop handle yet — the practical way to end a run today is to stop the
/// process, which is a known limitation rather than an oversight.
pub fn spawn_session_thread(armed: Arc<AtomicBool>, bus: tokio::sync::broadcast::Sender<BusMsg>) {
    std::thread::Builder::new()
        .name("qe-session-engine".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "failed to build session engine runtime");
                    return;
                }
            };

            rt.block_on(async move {
                let (engine, config_hash) = match build_engine(armed, bus) {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to build session engine");
                        return;
                    }
                };

                if let Err(e) = qe_engine::run_session_forever(engine, config_hash).await {
                    tracing::error!(error = %e, "session engine stopped with an error");
                }
            });
        })
        .expect("failed to spawn session engine thread");
}
