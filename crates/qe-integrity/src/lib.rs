//! qe-integrity
//!
//! Clock & market calendar, data integrity, and arm/disarm state (C1).
//!
//! Architectural decisions:
//! - No lookahead ever (reject incomplete bars)
//! - Fail on gap if gap_tolerance = 0, calendar-aware (NYSE sessions skip
//!   weekends/holidays/off-hours rather than counting them as missing bars)
//! - Stale feed disarms system
//! - Feed disagreement policy enforced
//!
//! Pure deterministic logic. No IO, no wall-clock in the evaluators — the
//! daemon/CLI entry points supply `now_tick`/`bar_end_ts` and wire `session::SystemClock`.

mod arm_state; // sticky disarm + fail-closed boot
pub mod calendar;
mod engine;
pub mod session;
mod types;

pub use arm_state::{ArmState, DisarmReason};
pub use calendar::CalendarSpec;
pub use engine::{evaluate_bar, tick_feed};
pub use session::{Clock, LunchBreak, SessionConfig, SystemClock};
pub use types::*;
