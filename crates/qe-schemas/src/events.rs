use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ExitReason, RejectReason, Symbol};

/// Envelope every structured event is wrapped in before it reaches the
/// audit log or the operator-facing event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub engine_id: String,
    pub ts_utc: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub causation_id: Option<Uuid>,
    pub topic: String,
    pub event_type: String,
    pub payload: T,
}

/// The typed event set named by the Error/Event Bus (C13). This is the
/// contract observability and the test suite are built against — every
/// component constructs one of these rather than emitting an ad-hoc log
/// line carrying the same information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    CycleStarted { symbol: Symbol, cycle_id: u64 },
    CycleCompleted { symbol: Symbol, cycle_id: u64 },
    SignalProposed { symbol: Symbol, strategy: String },
    SignalRejected { symbol: Symbol, reason: RejectReason },
    OrderSubmitted { symbol: Symbol, client_order_id: String },
    OrderFilled { symbol: Symbol, client_order_id: String, qty: i64 },
    OrderFailed { symbol: Symbol, client_order_id: String, reason: String },
    StopTriggered { symbol: Symbol, price_micros: i64 },
    PhantomDetected { symbol: Symbol },
    OrphanRecovered { symbol: Symbol },
    RiskLimitViolation { symbol: Symbol, reason: RejectReason },
    DailyLossBreach { equity_micros: i64, floor_micros: i64 },
    SessionStarted { session_date: String, config_hash: String },
    SessionEnded { session_date: String, trade_count: u64 },
    PositionClosed { symbol: Symbol, reason: ExitReason, realized_pnl_micros: i64 },
}

impl EngineEvent {
    /// Stable topic name used for the audit log and SSE bus filtering.
    pub fn topic(&self) -> &'static str {
        match self {
            EngineEvent::CycleStarted { .. } => "cycle.started",
            EngineEvent::CycleCompleted { .. } => "cycle.completed",
            EngineEvent::SignalProposed { .. } => "signal.proposed",
            EngineEvent::SignalRejected { .. } => "signal.rejected",
            EngineEvent::OrderSubmitted { .. } => "order.submitted",
            EngineEvent::OrderFilled { .. } => "order.filled",
            EngineEvent::OrderFailed { .. } => "order.failed",
            EngineEvent::StopTriggered { .. } => "stop.triggered",
            EngineEvent::PhantomDetected { .. } => "phantom.detected",
            EngineEvent::OrphanRecovered { .. } => "orphan.recovered",
            EngineEvent::RiskLimitViolation { .. } => "risk.violation",
            EngineEvent::DailyLossBreach { .. } => "risk.daily_loss_breach",
            EngineEvent::SessionStarted { .. } => "session.started",
            EngineEvent::SessionEnded { .. } => "session.ended",
            EngineEvent::PositionClosed { .. } => "position.closed",
        }
    }
}
