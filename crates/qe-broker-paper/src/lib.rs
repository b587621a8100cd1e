//! Deterministic in-memory "paper" broker adapter.
//!
//! Design decisions (kept intentionally simple/deterministic):
//! - `broker_order_id` is exactly `client_order_id`.
//! - `broker_message_id` is a stable string derived from request inputs:
//!     - submit:  "paper:msg:submit:{client_order_id}"
//!     - cancel:  "paper:msg:cancel:{client_order_id}"
//!     - replace: "paper:msg:replace:{client_order_id}:{new_qty}"
//!     - snapshot:"paper:msg:snapshot"
//!     - fill:    "paper:fill:{client_order_id}:{fill_seq}"
//! - No randomness. No timestamps.
//! - Fills are never auto-generated by `submit`/`cancel`/`replace` — a caller
//!   (the dry-run synthetic fill simulator) drives them explicitly through
//!   `apply_fill`, one `fill_seq` at a time, so replaying the identical
//!   sequence against the identical order is reproducible.
//!
//! This crate satisfies the Broker Adapter Contract: submit/cancel/replace
//! plus fetch snapshots (orders/positions), and the `BrokerAdapter`
//! implementation for `qe-execution`'s gateway lives in `adapter`.

use std::collections::BTreeMap;

use qe_reconcile::{BrokerSnapshot, OrderSnapshot, OrderStatus, Side};

pub mod adapter;
pub mod types;

use types::{
    ApplyFillError, BrokerMessageId, CancelRequest, FillEvent, ReplaceRequest, SubmitOrder,
    SubmitResponse,
};

#[derive(Clone, Debug, Default)]
pub struct PaperBroker {
    orders: BTreeMap<String, OrderSnapshot>, // keyed by broker_order_id (== client_order_id)
    positions: BTreeMap<String, i64>,        // symbol -> qty_signed
    fills: Vec<FillEvent>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a new order.
    ///
    /// Deterministic behavior:
    /// - If an order with the same `client_order_id` already exists, we treat submit as idempotent
    ///   and return the same response (no mutation).
    pub fn submit(&mut self, req: SubmitOrder) -> SubmitResponse {
        let broker_order_id = req.client_order_id.clone();
        let msg = BrokerMessageId::new(format!("paper:msg:submit:{}", req.client_order_id));

        if let Some(existing) = self.orders.get(&broker_order_id) {
            return SubmitResponse {
                broker_message_id: msg,
                broker_order_id,
                snapshot: existing.clone(),
            };
        }

        // Minimal "accepted" model: this broker accepts immediately.
        let snap = OrderSnapshot::new(
            broker_order_id.clone(),
            req.symbol,
            req.side,
            req.qty,
            0,
            OrderStatus::Accepted,
        );

        self.orders.insert(broker_order_id.clone(), snap.clone());

        SubmitResponse {
            broker_message_id: msg,
            broker_order_id,
            snapshot: snap,
        }
    }

    /// Cancel an order (idempotent).
    pub fn cancel(&mut self, req: CancelRequest) -> BrokerMessageId {
        let msg = BrokerMessageId::new(format!("paper:msg:cancel:{}", req.client_order_id));

        if let Some(ord) = self.orders.get_mut(&req.client_order_id) {
            ord.status = OrderStatus::Canceled;
        }

        msg
    }

    /// Replace an order's quantity (minimal deterministic stub).
    ///
    /// If the order doesn't exist, this is a no-op but still returns a deterministic message id.
    pub fn replace(&mut self, req: ReplaceRequest) -> BrokerMessageId {
        let msg = BrokerMessageId::new(format!(
            "paper:msg:replace:{}:{}",
            req.client_order_id, req.new_qty
        ));

        if let Some(ord) = self.orders.get_mut(&req.client_order_id) {
            ord.qty = req.new_qty;
        }

        msg
    }

    /// Apply a synthetic fill against a resting order.
    ///
    /// `fill_seq` is the caller's monotonically increasing fill counter for
    /// this order — `broker_fill_id` is `"paper:fill:{client_order_id}:{fill_seq}"`,
    /// so replaying the same sequence is a no-op in terms of identity even
    /// though the position/order mutation below is not itself idempotent
    /// (the caller must not apply the same `fill_seq` twice).
    pub fn apply_fill(
        &mut self,
        client_order_id: &str,
        fill_qty: i64,
        fill_price_micros: i64,
        fill_seq: u64,
    ) -> Result<FillEvent, ApplyFillError> {
        let ord = self
            .orders
            .get_mut(client_order_id)
            .ok_or_else(|| ApplyFillError::UnknownOrder {
                client_order_id: client_order_id.to_string(),
            })?;

        if !matches!(ord.status, OrderStatus::Accepted | OrderStatus::PartiallyFilled) {
            return Err(ApplyFillError::OrderNotFillable {
                client_order_id: client_order_id.to_string(),
            });
        }

        let remaining = ord.qty - ord.filled_qty;
        if fill_qty <= 0 || fill_qty > remaining {
            return Err(ApplyFillError::FillExceedsRemainingQty {
                client_order_id: client_order_id.to_string(),
                remaining,
                requested: fill_qty,
            });
        }

        ord.filled_qty += fill_qty;
        ord.status = if ord.filled_qty >= ord.qty {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };

        let signed_qty = match ord.side {
            Side::Buy => fill_qty,
            Side::Sell => -fill_qty,
        };
        *self.positions.entry(ord.symbol.clone()).or_insert(0) += signed_qty;

        let event = FillEvent {
            broker_fill_id: format!("paper:fill:{client_order_id}:{fill_seq}"),
            client_order_id: client_order_id.to_string(),
            symbol: ord.symbol.clone(),
            side: ord.side.clone(),
            fill_qty,
            fill_price_micros,
        };
        self.fills.push(event.clone());
        Ok(event)
    }

    /// All fills applied so far, in application order.
    pub fn fills(&self) -> &[FillEvent] {
        &self.fills
    }

    /// Deterministic listing: BTreeMap iteration order is stable.
    pub fn list_orders(&self) -> Vec<OrderSnapshot> {
        self.orders.values().cloned().collect()
    }

    pub fn positions(&self) -> BTreeMap<String, i64> {
        self.positions.clone()
    }

    /// Set a position deterministically for test setup / scenario wiring.
    pub fn set_position(&mut self, symbol: impl Into<String>, qty_signed: i64) {
        self.positions.insert(symbol.into(), qty_signed);
    }

    /// Produce a broker snapshot compatible with qe-reconcile.
    pub fn snapshot(&self) -> (BrokerMessageId, BrokerSnapshot) {
        let msg = BrokerMessageId::new("paper:msg:snapshot".to_string());
        let snap = BrokerSnapshot {
            orders: self.orders.clone(),
            positions: self.positions.clone(),
        };
        (msg, snap)
    }

    /// Helper for tests: create a "local view" that matches this broker snapshot.
    pub fn as_local_snapshot(&self) -> qe_reconcile::LocalSnapshot {
        qe_reconcile::LocalSnapshot {
            orders: self.orders.clone(),
            positions: self.positions.clone(),
        }
    }
}

/// Convenience constructors for common values used by tests/examples.
pub fn buy(symbol: impl Into<String>, qty: i64, client_order_id: impl Into<String>) -> SubmitOrder {
    SubmitOrder {
        client_order_id: client_order_id.into(),
        symbol: symbol.into(),
        side: Side::Buy,
        qty,
    }
}

pub fn sell(
    symbol: impl Into<String>,
    qty: i64,
    client_order_id: impl Into<String>,
) -> SubmitOrder {
    SubmitOrder {
        client_order_id: client_order_id.into(),
        symbol: symbol.into(),
        side: Side::Sell,
        qty,
    }
}
