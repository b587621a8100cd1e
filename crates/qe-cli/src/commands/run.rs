//! Constructs a [`qe_engine::SessionEngine`] over a fresh in-process paper
//! broker for `qe run once`. Mirrors qe-daemon's `engine_bridge::build_engine`
//! but drives a single session to completion instead of looping forever, and
//! logs through `TracingOnlySink` instead of an SSE bus since there is no
//! bus to feed from a one-shot CLI invocation.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use qe_config::EngineConfig;
use qe_engine::{
    EodInputs, JsonlPositionSnapshotStore, JsonlTradeLog, PaperAccount, PaperPositionsView,
    SessionEngine, SharedPaperBroker, TracingOnlySink,
};
use qe_execution::gateway::BrokerGateway;
use qe_indicators::IndicatorService;
use qe_integrity::session::SessionConfig;
use qe_integrity::CalendarSpec;
use qe_marketdata::live::FixtureMarketDataProvider;
use qe_policy::PolicyTable;
use qe_reporting::NoopReportSink;
use qe_risk::{RiskConfig, RiskState};
use qe_schemas::MICROS_SCALE;
use qe_strategy::{ShadowMode, StrategyHost};
use uuid::Uuid;

const STARTING_EQUITY_MICROS: i64 = 100_000 * MICROS_SCALE;

fn load_engine_config(config_path: &Option<String>) -> anyhow::Result<EngineConfig> {
    match config_path {
        Some(path) => {
            let loaded = qe_config::load_layered_yaml(&[path.as_str()])?;
            Ok(EngineConfig::from_json(&loaded.config_json)?)
        }
        None => {
            let json = serde_json::json!({ "watchlist": ["AAPL", "MSFT", "NVDA"] });
            Ok(EngineConfig::from_json(&json)?)
        }
    }
}

/// Runs exactly one trading session against a fresh paper broker and returns
/// the trades it produced, so the caller can build and print an EOD report.
pub async fn run_once(config_path: Option<String>, data_dir: &std::path::Path) -> anyhow::Result<EodInputs> {
    let config = load_engine_config(&config_path)?;
    let config_json = serde_json::to_value(&config)?;
    let config_hash = {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(serde_json::to_string(&config_json)?.as_bytes()))
    };

    let resolved_policies = qe_config::resolve_symbol_policies(&config.symbol_policies)
        .map_err(|e| anyhow::anyhow!("config rejected: {e}"))?;
    let policies = PolicyTable::build(resolved_policies)
        .map_err(|e| anyhow::anyhow!("policy table rejected: {e}"))?;

    std::fs::create_dir_all(data_dir)?;

    let broker = SharedPaperBroker::new();
    let gateway = BrokerGateway::new(broker.clone());
    let positions_view = Box::new(PaperPositionsView::new(broker));

    let mut engine = SessionEngine::new(
        config,
        policies,
        RiskConfig::sane_defaults(),
        CalendarSpec::AlwaysOn,
        SessionConfig::default(),
        Arc::new(FixtureMarketDataProvider::new(chrono::Utc::now().timestamp())),
        gateway,
        positions_view,
        Arc::new(AtomicBool::new(true)),
        Box::new(PaperAccount::new(STARTING_EQUITY_MICROS)),
        RiskState::new(0, STARTING_EQUITY_MICROS, 0),
        qe_portfolio::PositionStore::new(),
        IndicatorService::new(),
        StrategyHost::with_default_strategies(ShadowMode::Off),
        Box::new(JsonlPositionSnapshotStore::new(data_dir.join("positions"))?),
        Box::new(JsonlTradeLog::new(data_dir.join("trades.jsonl"))?),
        Box::new(TracingOnlySink),
        Box::new(NoopReportSink),
        Uuid::new_v4(),
    );

    engine.run_one_session(&config_hash).await
}
