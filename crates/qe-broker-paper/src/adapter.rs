//! `BrokerAdapter` implementation wiring `PaperBroker` into `qe-execution`'s
//! gateway. The gateway's trait takes `&self`, so the broker lives behind a
//! `RefCell` — single-threaded, deterministic, no locking needed.

use std::cell::RefCell;

use qe_execution::{
    BrokerAdapter, BrokerCancelResponse, BrokerReplaceRequest, BrokerReplaceResponse,
    BrokerSubmitRequest, BrokerSubmitResponse,
};
use qe_reconcile::{OrderStatus, Side};

use crate::types::{CancelRequest, ReplaceRequest, SubmitOrder};
use crate::PaperBroker;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// `PaperBroker` behind a `RefCell`, implementing `qe_execution::BrokerAdapter`.
#[derive(Debug, Default)]
pub struct LockedPaperBroker {
    inner: RefCell<PaperBroker>,
}

impl LockedPaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escape hatch for tests/scenarios that want to drive fills or inspect
    /// state directly rather than through the `BrokerAdapter` trait.
    pub fn with_broker<R>(&self, f: impl FnOnce(&mut PaperBroker) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }
}

fn parse_side(order_type_qty: i32) -> Side {
    if order_type_qty >= 0 {
        Side::Buy
    } else {
        Side::Sell
    }
}

fn status_str(status: &OrderStatus) -> &'static str {
    match status {
        OrderStatus::New => "new",
        OrderStatus::Accepted => "accepted",
        OrderStatus::PartiallyFilled => "partially_filled",
        OrderStatus::Filled => "filled",
        OrderStatus::Canceled => "canceled",
        OrderStatus::Rejected => "rejected",
        OrderStatus::Unknown => "unknown",
    }
}

impl BrokerAdapter for LockedPaperBroker {
    fn submit_order(&self, req: BrokerSubmitRequest) -> Result<BrokerSubmitResponse> {
        let side = parse_side(req.quantity);
        let resp = self.inner.borrow_mut().submit(SubmitOrder {
            client_order_id: req.order_id,
            symbol: req.symbol,
            side,
            qty: req.quantity.unsigned_abs() as i64,
        });
        Ok(BrokerSubmitResponse {
            broker_order_id: resp.broker_order_id,
            submitted_at: 0,
            status: status_str(&resp.snapshot.status).to_string(),
        })
    }

    fn cancel_order(&self, order_id: &str) -> Result<BrokerCancelResponse> {
        self.inner.borrow_mut().cancel(CancelRequest {
            client_order_id: order_id.to_string(),
        });
        Ok(BrokerCancelResponse {
            broker_order_id: order_id.to_string(),
            cancelled_at: 0,
            status: "canceled".to_string(),
        })
    }

    fn replace_order(&self, req: BrokerReplaceRequest) -> Result<BrokerReplaceResponse> {
        let broker_order_id = req.broker_order_id.clone();
        self.inner.borrow_mut().replace(ReplaceRequest {
            client_order_id: broker_order_id.clone(),
            new_qty: req.quantity.unsigned_abs() as i64,
        });
        Ok(BrokerReplaceResponse {
            broker_order_id,
            replaced_at: 0,
            status: "replaced".to_string(),
        })
    }
}
