//! Order Manager & Broker Gateway (C8).
//!
//! - `gateway`: the single choke-point all broker operations must pass
//!   through (integrity armed, risk allowed, reconcile clean).
//! - `order_router` / `oms`: broker-agnostic routing and the explicit
//!   lifecycle state machine for a single order.
//! - `sizing` / `intent_id`: pure entry-sizing and idempotent client-order-id
//!   derivation.
//! - `targets_to_order_intents`: diffs current vs. target positions into buy
//!   /sell intents — also the mechanism behind session-end flatten (target
//!   everything to zero).
//!
//! Deterministic, pure logic at every layer except the broker adapter itself.

pub mod gateway;
pub mod id_map;
pub mod intent_id;
pub mod oms;
pub mod order_router;
pub mod prices;
pub mod reconcile_guard;
mod engine;
mod sizing;
mod types;

pub use engine::targets_to_order_intents;
pub use gateway::{intent_id_to_client_order_id, BrokerGateway, GateRefusal, GateVerdicts, UnknownOrder};
pub use id_map::BrokerOrderMap;
pub use order_router::{
    BrokerAdapter, BrokerCancelResponse, BrokerReplaceRequest, BrokerReplaceResponse,
    BrokerSubmitRequest, BrokerSubmitResponse,
};
pub use sizing::size_entry_qty;
pub use types::{ExecutionDecision, OrderIntent, Side, StrategyOutput, TargetPosition};

use std::collections::BTreeMap;

/// Canonical type for current positions, keyed by symbol.
/// Signed quantity: +long, -short.
pub type PositionBook = BTreeMap<String, i64>;

/// Helper to build a PositionBook with minimal boilerplate in tests/callers.
pub fn position_book<I, S>(items: I) -> PositionBook
where
    I: IntoIterator<Item = (S, i64)>,
    S: Into<String>,
{
    let mut book = PositionBook::new();
    for (sym, qty) in items {
        book.insert(sym.into(), qty);
    }
    book
}

/// Session-end flatten: every open position's target becomes zero, so
/// `targets_to_order_intents` emits the closing side/qty for each one.
pub fn flatten_all(current: &PositionBook) -> ExecutionDecision {
    let output = StrategyOutput::new(Vec::new());
    targets_to_order_intents(current, &output)
}
