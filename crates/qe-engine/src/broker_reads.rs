//! Broker read-side: positions.
//!
//! `qe_execution::BrokerAdapter` is intentionally thin — submit/cancel/
//! replace only — so the order-gateway boundary stays narrow and easy to
//! gate (see `qe_execution::gateway::BrokerGateway`). Bars and quotes are
//! covered by `qe_marketdata::live::MarketDataProvider`; the trading
//! calendar by `qe_integrity::calendar::CalendarSpec`. What's left is a way
//! to read the broker's current position book for reconcile and recovery,
//! which this trait covers.

use std::collections::BTreeMap;
use std::rc::Rc;

use qe_broker_paper::adapter::LockedPaperBroker;
use qe_execution::order_router::{
    BrokerAdapter, BrokerCancelResponse, BrokerReplaceRequest, BrokerReplaceResponse,
    BrokerSubmitRequest, BrokerSubmitResponse,
};
use qe_reconcile::BrokerSnapshot;

/// Read-only view onto the broker's position book, used by the reconcile
/// loop (C6) and by position recovery (C10) on boot.
pub trait PositionsView: Send + Sync {
    /// Signed quantity per symbol (positive = long, negative = short).
    fn positions(&self) -> BTreeMap<String, i64>;

    /// Broker-side snapshot (orders + positions), the ground truth the
    /// engine's own `LocalSnapshot` is reconciled against.
    fn broker_snapshot(&self) -> BrokerSnapshot;
}

/// `Rc`-shared handle onto a [`LockedPaperBroker`] — `BrokerGateway::new`
/// takes its adapter by value, so the same broker the gateway submits
/// through is wrapped here and cloned (cheaply, by `Rc`) wherever something
/// else also needs to read it, e.g. [`PaperPositionsView`].
#[derive(Clone, Default)]
pub struct SharedPaperBroker(Rc<LockedPaperBroker>);

impl SharedPaperBroker {
    pub fn new() -> Self {
        Self(Rc::new(LockedPaperBroker::new()))
    }

    pub fn with_broker<R>(&self, f: impl FnOnce(&mut qe_broker_paper::PaperBroker) -> R) -> R {
        self.0.with_broker(f)
    }
}

impl BrokerAdapter for SharedPaperBroker {
    fn submit_order(
        &self,
        req: BrokerSubmitRequest,
    ) -> std::result::Result<BrokerSubmitResponse, Box<dyn std::error::Error>> {
        self.0.submit_order(req)
    }

    fn cancel_order(
        &self,
        order_id: &str,
    ) -> std::result::Result<BrokerCancelResponse, Box<dyn std::error::Error>> {
        self.0.cancel_order(order_id)
    }

    fn replace_order(
        &self,
        req: BrokerReplaceRequest,
    ) -> std::result::Result<BrokerReplaceResponse, Box<dyn std::error::Error>> {
        self.0.replace_order(req)
    }
}

/// `PositionsView` over a [`SharedPaperBroker`], read via its `with_broker`
/// escape hatch rather than a second `RefCell` wrapper.
pub struct PaperPositionsView {
    broker: SharedPaperBroker,
}

impl PaperPositionsView {
    pub fn new(broker: SharedPaperBroker) -> Self {
        Self { broker }
    }
}

impl PositionsView for PaperPositionsView {
    fn positions(&self) -> BTreeMap<String, i64> {
        self.broker.with_broker(|b| b.positions())
    }

    fn broker_snapshot(&self) -> BrokerSnapshot {
        self.broker.with_broker(|b| b.snapshot().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_positions_set_directly_on_the_broker() {
        let broker = SharedPaperBroker::new();
        broker.with_broker(|b| {
            b.set_position("AAPL", 100);
            b.set_position("MSFT", -50);
        });

        let view = PaperPositionsView::new(broker);
        let positions = view.positions();
        assert_eq!(positions.get("AAPL"), Some(&100));
        assert_eq!(positions.get("MSFT"), Some(&-50));
    }

    #[test]
    fn broker_snapshot_mirrors_broker_state() {
        let broker = SharedPaperBroker::new();
        broker.with_broker(|b| b.set_position("AAPL", 10));

        let view = PaperPositionsView::new(broker);
        let snapshot = view.broker_snapshot();
        assert_eq!(snapshot.positions.get("AAPL"), Some(&10));
    }
}
