//! Broker Gateway — the SINGLE choke-point for all broker operations.
//!
//! # Invariant (enforced at both compile-time and runtime)
//!
//! **Compile-time:** `OrderRouter` is `pub(crate)` and is never re-exported
//! from `lib.rs`. External crates have no way to construct one. The only
//! public API that reaches a broker adapter is `BrokerGateway`.
//!
//! **Runtime:** Every call to `submit / cancel / replace` evaluates three
//! gate verdicts in order and refuses with `GateRefusal` if any fails:
//!
//! 1. `integrity_armed`  — system integrity is not disarmed or halted
//! 2. `risk_allowed`     — risk engine returned Allow for this request
//! 3. `reconcile_clean`  — most recent reconcile report is Clean
//!
//! Callers evaluate each verdict from the respective engine and pass the
//! result here. The gateway is the final policy enforcer.
//!
//! Gate checks run *before* order-provenance checks: a cancel/replace on an
//! order this gateway never submitted is refused with [`UnknownOrder`], but
//! only once all three gates have cleared. This keeps the two failure modes
//! (policy refusal vs. provenance refusal) cleanly distinguishable by error
//! type.

use std::cell::RefCell;

use crate::id_map::BrokerOrderMap;
use crate::order_router::{
    BrokerAdapter, BrokerCancelResponse, BrokerReplaceRequest, BrokerReplaceResponse,
    BrokerSubmitRequest, BrokerSubmitResponse, OrderRouter,
};

// ---------------------------------------------------------------------------
// GateVerdicts
// ---------------------------------------------------------------------------

/// Pre-evaluated gate verdicts the caller must supply before every broker op.
///
/// | Field             | Source                                      |
/// |-------------------|---------------------------------------------|
/// | `integrity_armed` | `!IntegrityState::is_execution_blocked()`   |
/// | `risk_allowed`    | `RiskDecision::action == RiskAction::Allow` |
/// | `reconcile_clean` | `ReconcileReport::is_clean()`               |
#[derive(Debug, Clone)]
pub struct GateVerdicts {
    pub integrity_armed: bool,
    pub risk_allowed: bool,
    pub reconcile_clean: bool,
}

impl GateVerdicts {
    /// All gates clear — convenience helper for paper/test mode.
    pub fn all_clear() -> Self {
        Self {
            integrity_armed: true,
            risk_allowed: true,
            reconcile_clean: true,
        }
    }
}

// ---------------------------------------------------------------------------
// GateRefusal
// ---------------------------------------------------------------------------

/// The reason a broker operation was refused at the gateway.
///
/// Implements `std::error::Error` so it can be boxed and propagated through
/// `Box<dyn Error>` chains without extra wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRefusal {
    IntegrityDisarmed,
    RiskBlocked,
    ReconcileNotClean,
}

impl std::fmt::Display for GateRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateRefusal::IntegrityDisarmed => {
                write!(f, "GATE_REFUSED: integrity disarmed or halted")
            }
            GateRefusal::RiskBlocked => {
                write!(f, "GATE_REFUSED: risk engine did not allow")
            }
            GateRefusal::ReconcileNotClean => {
                write!(f, "GATE_REFUSED: reconcile is not clean")
            }
        }
    }
}

impl std::error::Error for GateRefusal {}

// ---------------------------------------------------------------------------
// UnknownOrder
// ---------------------------------------------------------------------------

/// Returned by `cancel`/`replace` when `internal_id` has no live mapping to a
/// broker order id — either it was never submitted through this gateway, or
/// it already reached a terminal state and was deregistered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOrder {
    pub internal_id: String,
}

impl std::fmt::Display for UnknownOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CANCEL_REPLACE_REFUSED: no broker order mapped for internal id '{}'",
            self.internal_id
        )
    }
}

impl std::error::Error for UnknownOrder {}

// ---------------------------------------------------------------------------
// BrokerGateway
// ---------------------------------------------------------------------------

/// The SINGLE choke-point through which ALL broker operations must flow.
///
/// # Architecture
///
/// `BrokerGateway` owns a **private** `OrderRouter<B>`. Because `OrderRouter`
/// is `pub(crate)`, it cannot be constructed or accessed from any crate
/// outside `qe-execution`. The only way external code can reach a broker
/// adapter is through the public methods defined here — all of which evaluate
/// the three gate checks before delegating.
///
/// It also owns the [`BrokerOrderMap`] that records internal → broker order
/// id after every successful submit, so cancel/replace can be addressed by
/// the caller's own internal order id rather than a broker-assigned one.
///
/// ```text
/// External code
///     │
///     └──► BrokerGateway::submit / cancel / replace
///                │
///                ├── enforce_gates (integrity + risk + reconcile)
///                │        └── GateRefusal  ◄── refused here if any fails
///                │
///                ├── order_map lookup (cancel/replace only)
///                │        └── UnknownOrder  ◄── refused if internal id unmapped
///                │
///                └── OrderRouter::route_*  ◄── only reached if all clear
///                         └── BrokerAdapter::*
/// ```
pub struct BrokerGateway<B: BrokerAdapter> {
    /// Private: unreachable from outside `qe-execution`.
    router: OrderRouter<B>,
    order_map: RefCell<BrokerOrderMap>,
}

impl<B: BrokerAdapter> BrokerGateway<B> {
    /// Create a gateway wrapping the given broker adapter.
    pub fn new(broker: B) -> Self {
        Self {
            router: OrderRouter::new(broker),
            order_map: RefCell::new(BrokerOrderMap::new()),
        }
    }

    /// Evaluate all three gate verdicts in order.
    /// Returns the first refusal encountered, or `Ok(())` if all pass.
    fn enforce_gates(verdicts: &GateVerdicts) -> Result<(), GateRefusal> {
        if !verdicts.integrity_armed {
            return Err(GateRefusal::IntegrityDisarmed);
        }
        if !verdicts.risk_allowed {
            return Err(GateRefusal::RiskBlocked);
        }
        if !verdicts.reconcile_clean {
            return Err(GateRefusal::ReconcileNotClean);
        }
        Ok(())
    }

    /// Submit a new broker order.
    ///
    /// All three gates must be clear. On success, registers
    /// `req.order_id → response.broker_order_id` so subsequent cancel/replace
    /// calls can address this order by its internal id.
    pub fn submit(
        &self,
        req: BrokerSubmitRequest,
        verdicts: &GateVerdicts,
    ) -> Result<BrokerSubmitResponse, Box<dyn std::error::Error>> {
        Self::enforce_gates(verdicts)?;
        let internal_id = req.order_id.clone();
        let resp = self.router.route_submit(req)?;
        self.order_map
            .borrow_mut()
            .register(internal_id, resp.broker_order_id.clone());
        Ok(resp)
    }

    /// Cancel a broker order, addressed by its internal order id.
    ///
    /// All three gates must be clear, and `internal_order_id` must have a
    /// live mapping to a broker order id (registered by a prior `submit`).
    pub fn cancel(
        &self,
        internal_order_id: &str,
        verdicts: &GateVerdicts,
    ) -> Result<BrokerCancelResponse, Box<dyn std::error::Error>> {
        Self::enforce_gates(verdicts)?;
        let broker_id = self.resolve_broker_id(internal_order_id)?;
        self.router.route_cancel(&broker_id)
    }

    /// Replace (amend) a broker order, addressed by its internal order id.
    ///
    /// All three gates must be clear, and `internal_order_id` must have a
    /// live mapping to a broker order id (registered by a prior `submit`).
    pub fn replace(
        &self,
        internal_order_id: &str,
        quantity: i32,
        limit_price: Option<f64>,
        time_in_force: String,
        verdicts: &GateVerdicts,
    ) -> Result<BrokerReplaceResponse, Box<dyn std::error::Error>> {
        Self::enforce_gates(verdicts)?;
        let broker_id = self.resolve_broker_id(internal_order_id)?;
        let req = BrokerReplaceRequest {
            broker_order_id: broker_id,
            quantity,
            limit_price,
            time_in_force,
        };
        self.router.route_replace(req)
    }

    /// Deregister an order's mapping once it reaches a terminal state
    /// (filled, cancel-ack, rejected). Keeps the map bounded.
    pub fn deregister(&self, internal_order_id: &str) {
        self.order_map.borrow_mut().deregister(internal_order_id);
    }

    fn resolve_broker_id(&self, internal_order_id: &str) -> Result<String, UnknownOrder> {
        self.order_map
            .borrow()
            .broker_id(internal_order_id)
            .map(|s| s.to_string())
            .ok_or_else(|| UnknownOrder {
                internal_id: internal_order_id.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Idempotency derivation
// ---------------------------------------------------------------------------

/// Derive the stable `client_order_id` for a given intent ID.
///
/// This is the **canonical** derivation point: every call-site — first submit
/// or any subsequent retry — must use this function. Because the mapping is
/// deterministic (same `intent_id` ⟹ same output), retries automatically
/// reuse the same key, preventing broker-side duplicate submission.
///
/// The `client_order_id` is the `intent_id` itself. No hash or transformation
/// is applied: intent IDs are already stable, unique, run-scoped identifiers.
pub fn intent_id_to_client_order_id(intent_id: &str) -> String {
    intent_id.to_string()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
