use qe_reconcile::{OrderSnapshot, Side};

/// Deterministic broker message ID suitable for inbox de-dupe.
/// Kept as an opaque string newtype.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrokerMessageId(pub String);

impl BrokerMessageId {
    pub fn new(id: String) -> Self {
        Self(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOrder {
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitResponse {
    pub broker_message_id: BrokerMessageId,
    pub broker_order_id: String,
    pub snapshot: OrderSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelRequest {
    pub client_order_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceRequest {
    pub client_order_id: String,
    pub new_qty: i64,
}

/// A single synthetic fill applied against a resting order.
///
/// `broker_fill_id` is derived from `(client_order_id, fill_seq)` so that
/// replaying the same fill sequence against the same order is idempotent
/// and auditable — no randomness, no wall-clock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FillEvent {
    pub broker_fill_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: Side,
    pub fill_qty: i64,
    pub fill_price_micros: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApplyFillError {
    UnknownOrder { client_order_id: String },
    OrderNotFillable { client_order_id: String },
    FillExceedsRemainingQty { client_order_id: String, remaining: i64, requested: i64 },
}

impl std::fmt::Display for ApplyFillError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyFillError::UnknownOrder { client_order_id } => {
                write!(f, "no resting order for client_order_id '{client_order_id}'")
            }
            ApplyFillError::OrderNotFillable { client_order_id } => {
                write!(f, "order '{client_order_id}' is not in a fillable state")
            }
            ApplyFillError::FillExceedsRemainingQty {
                client_order_id,
                remaining,
                requested,
            } => write!(
                f,
                "fill of {requested} exceeds remaining qty {remaining} for order '{client_order_id}'"
            ),
        }
    }
}

impl std::error::Error for ApplyFillError {}
