//! Shared data model for the trading engine workspace.
//!
//! Every other crate in the workspace depends on `qe-schemas` for the
//! entities that cross component boundaries (`Bar`, `IndicatorSnapshot`,
//! `Signal`, `Position`, `CompletedTrade`, the typed event set, and the
//! broker-facing snapshot types). None of these types carry behavior beyond
//! constructors and simple accessors — the logic that produces or consumes
//! them lives in the owning crate (`qe-indicators`, `qe-confidence`,
//! `qe-risk`, `qe-portfolio`, ...).

mod broker;
mod events;
mod types;

pub use broker::{BrokerAccount, BrokerFill, BrokerOrder, BrokerPosition, BrokerSnapshot};
pub use events::{EngineEvent, EventEnvelope};
pub use types::{
    Bar, CompletedTrade, ConfidenceMode, ConfidenceResult, Direction, ExitReason, Position,
    PositionSide, RejectReason, Signal, SignalAction, Symbol, TradeDecision, MICROS_SCALE,
};
