//! Risk Gate (C7).
//!
//! Goals:
//! - Daily loss limit enforcement
//! - Max drawdown guard
//! - Reject storm protection
//! - PDT auto mode enforcement (multi-day FINRA pattern, see [`pdt`])
//! - Per-trade notional / concurrent-position / short-exposure limits
//! - Daily trade cap, a single-day sibling of [`pdt`] (see [`daily_trade_cap`])
//! - Kill switch behavior
//!
//! Deterministic, pure logic. No IO, no time, no broker calls. A rejection
//! from [`evaluate`] always cancels the order outright — callers must never
//! reinterpret a `Reject` as an opposite-side order or a position close.

pub mod daily_trade_cap;
mod engine;
mod types;

pub mod pdt;

pub use daily_trade_cap::{
    DailyTradeCapPolicy, DailyTradeCapState, DEFAULT_MAX_TRADES_PER_DAY,
};
pub use engine::{evaluate, tick, validate_equity_input, validate_order_qty}; // Patch L10
pub use pdt::{
    clear_pdt_flag, evaluate_pdt, record_day_trade, tick_pdt, to_pdt_context, PdtDecision,
    PdtInput, PdtPolicy, PdtReason, PdtState, PDT_DAY_TRADE_THRESHOLD, PDT_DEFAULT_WINDOW_DAYS,
    PDT_MIN_EQUITY_MICROS,
};
pub use types::*;
