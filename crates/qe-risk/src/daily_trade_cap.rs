//! Daily trade cap: a dedicated, deterministic module for "no more than N
//! trades today", kept separate from [`crate::pdt`] (multi-day FINRA
//! pattern-day-trader enforcement) and from the notional/exposure/drawdown
//! checks in [`crate::engine`]. Same split as `pdt.rs`: policy + state +
//! pure decision, with an explicit `record_trade` for the side effect.

/// Default daily trade cap: 6 trades per trading day.
pub const DEFAULT_MAX_TRADES_PER_DAY: u32 = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyTradeCapPolicy {
    pub max_trades_per_day: u32,
}

impl DailyTradeCapPolicy {
    pub fn default_policy() -> Self {
        Self {
            max_trades_per_day: DEFAULT_MAX_TRADES_PER_DAY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyTradeCapState {
    pub day_id: u32,
    pub trades_today: u32,
}

impl DailyTradeCapState {
    pub fn new(day_id: u32) -> Self {
        Self {
            day_id,
            trades_today: 0,
        }
    }
}

/// Resets `trades_today` on day rollover. Call once per evaluation, before
/// [`would_exceed`].
pub fn tick(state: &mut DailyTradeCapState, day_id: u32) {
    if day_id != state.day_id {
        state.day_id = day_id;
        state.trades_today = 0;
    }
}

/// `true` if one more trade today would exceed the cap. Pure; does not
/// mutate `state`.
pub fn would_exceed(policy: &DailyTradeCapPolicy, state: &DailyTradeCapState) -> bool {
    state.trades_today >= policy.max_trades_per_day
}

/// Records that a trade executed today. Call only after the trade is
/// confirmed, mirroring [`crate::pdt::record_day_trade`]'s after-the-fact
/// accounting.
pub fn record_trade(state: &mut DailyTradeCapState, day_id: u32) {
    tick(state, day_id);
    state.trades_today = state.trades_today.saturating_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_does_not_exceed() {
        let policy = DailyTradeCapPolicy::default_policy();
        let state = DailyTradeCapState::new(20260101);
        assert!(!would_exceed(&policy, &state));
    }

    #[test]
    fn exceeds_after_max_trades() {
        let policy = DailyTradeCapPolicy {
            max_trades_per_day: 2,
        };
        let mut state = DailyTradeCapState::new(20260101);
        record_trade(&mut state, 20260101);
        assert!(!would_exceed(&policy, &state));
        record_trade(&mut state, 20260101);
        assert!(would_exceed(&policy, &state));
    }

    #[test]
    fn day_rollover_resets_count() {
        let policy = DailyTradeCapPolicy {
            max_trades_per_day: 1,
        };
        let mut state = DailyTradeCapState::new(20260101);
        record_trade(&mut state, 20260101);
        assert!(would_exceed(&policy, &state));

        tick(&mut state, 20260102);
        assert!(!would_exceed(&policy, &state));
    }
}
