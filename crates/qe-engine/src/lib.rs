//! Trading Engine (C9-C12): wires the decision/execution pipeline built by
//! every other `qe-*` crate into one running process — position state
//! (C10), the account ledger, the broker read-side, the per-cycle decision
//! loop (C11), and the session scheduler around it.
//!
//! Everything below the gateway/broker boundary is deterministic and pure;
//! this crate is where that purity meets wall-clock time, `tokio`, and a
//! concrete (paper, for now) broker.

pub mod account;
pub mod broker_reads;
pub mod cycle;
pub mod events;
pub mod persistence;
pub mod recovery;
pub mod session;

pub use account::{AccountView, PaperAccount};
pub use broker_reads::{PaperPositionsView, PositionsView, SharedPaperBroker};
pub use cycle::{fetch_cycle_inputs, run_cycle, CycleInputs, CycleOutcome, CycleSkipReason};
pub use events::{AuditEventSink, EventSink, TracingOnlySink};
pub use persistence::{
    InMemoryPositionSnapshotStore, InMemoryTradeLog, JsonlPositionSnapshotStore, JsonlTradeLog,
    PositionSnapshot, PositionSnapshotStore, TradeLog,
};
pub use recovery::{recover_open_positions, PolicyLookup};
pub use session::{run_session_forever, EodInputs, SessionEngine};
