//! Clock & Market Calendar (C1).
//!
//! Built on the NYSE session-boundary logic in `calendar.rs`. Everything
//! here is a pure function of an epoch-seconds instant; the only injected
//! dependency is a `Clock` trait so the rest of the engine never calls the
//! wall clock directly and tests can run against a fixed instant.

use crate::calendar::epoch_secs_to_ymd;

const ET_OFFSET_SECS: i64 = 5 * 3600;
const OPEN_SECS: i64 = 9 * 3600 + 30 * 60; // 09:30:00 ET
const CLOSE_SECS: i64 = 16 * 3600; // 16:00:00 ET
const FIVE_MIN: i64 = 5 * 60;

/// Authoritative "now" for the engine. Production wires `SystemClock`;
/// tests and backtests wire a fixed or simulated instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall-clock implementation, used only by the daemon/CLI entry points.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs() as i64
    }
}

/// An optional lunch break within the trading window, expressed as ET
/// seconds-since-midnight. `None` means no lunch break is configured.
#[derive(Debug, Clone, Copy)]
pub struct LunchBreak {
    pub start_et_secs: i64,
    pub end_et_secs: i64,
}

/// Configuration for the trading-window calculation. Defaults match §6:
/// trading window `[open+5min, close-5min]`, no lunch break.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub lunch_break: Option<LunchBreak>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { lunch_break: None }
    }
}

fn et_seconds_of_day(instant: i64) -> i64 {
    (instant - ET_OFFSET_SECS).rem_euclid(86_400)
}

fn day_start(instant: i64) -> i64 {
    let et = instant - ET_OFFSET_SECS;
    let day = et.div_euclid(86_400);
    day * 86_400 + ET_OFFSET_SECS
}

fn is_trading_day(instant: i64) -> bool {
    // A bar-end check at local noon is a cheap, unambiguous way to reuse the
    // weekday+holiday logic in `calendar.rs` without duplicating it.
    let noon = day_start(instant) + 12 * 3600;
    crate::calendar::CalendarSpec::NyseWeekdays.is_session_bar_end(noon)
}

/// `true` if `instant` falls within NYSE regular session hours
/// (09:30–16:00 ET) on a trading day.
pub fn is_market_open(instant: i64) -> bool {
    if !is_trading_day(instant) {
        return false;
    }
    let t = et_seconds_of_day(instant);
    t > OPEN_SECS && t <= CLOSE_SECS
}

/// The next market open at or after `instant`, walking forward one day at a
/// time. Bounded to one year of lookahead as a sanity backstop.
pub fn next_open(instant: i64) -> i64 {
    let mut day = day_start(instant);
    for _ in 0..370 {
        let candidate = day + OPEN_SECS;
        if candidate >= instant && is_trading_day(candidate) {
            return candidate;
        }
        day += 86_400;
    }
    panic!("no trading day found within 370 days of {instant}");
}

/// The next market close at or after `instant`.
pub fn next_close(instant: i64) -> i64 {
    let mut day = day_start(instant);
    for _ in 0..370 {
        let candidate = day + CLOSE_SECS;
        if candidate >= instant && is_trading_day(candidate) {
            return candidate;
        }
        day += 86_400;
    }
    panic!("no trading day found within 370 days of {instant}");
}

/// `true` if `instant` is inside `[open+5min, close-5min]`, excluding any
/// configured lunch break.
pub fn is_trading_window(instant: i64, cfg: &SessionConfig) -> bool {
    if !is_trading_day(instant) {
        return false;
    }
    let t = et_seconds_of_day(instant);
    let window_start = OPEN_SECS + FIVE_MIN;
    let window_end = CLOSE_SECS - FIVE_MIN;
    if !(t >= window_start && t <= window_end) {
        return false;
    }
    if let Some(lunch) = cfg.lunch_break {
        if t >= lunch.start_et_secs && t < lunch.end_et_secs {
            return false;
        }
    }
    true
}

/// ET calendar date for `instant`, exposed for report/event stamping.
pub fn et_date(instant: i64) -> (i64, i64, i64) {
    epoch_secs_to_ymd(instant - ET_OFFSET_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MON_10AM_ET: i64 = 1_704_726_000; // 2024-01-08 Mon 10:00 ET

    #[test]
    fn market_open_during_session() {
        assert!(is_market_open(MON_10AM_ET));
    }

    #[test]
    fn market_closed_before_open() {
        let before_open = MON_10AM_ET - 2 * 3600 - 30 * 60; // 07:30 ET
        assert!(!is_market_open(before_open));
    }

    #[test]
    fn trading_window_excludes_first_five_minutes() {
        let at_open = MON_10AM_ET - (10 * 3600 - OPEN_SECS); // exactly 09:30 ET
        assert!(!is_trading_window(at_open, &SessionConfig::default()));
    }

    #[test]
    fn trading_window_excludes_lunch_break() {
        let cfg = SessionConfig {
            lunch_break: Some(LunchBreak {
                start_et_secs: 12 * 3600,
                end_et_secs: 13 * 3600,
            }),
        };
        let noon = MON_10AM_ET + 2 * 3600; // 12:00 ET
        assert!(!is_trading_window(noon, &cfg));
    }

    #[test]
    fn next_open_skips_weekend() {
        let saturday_morning = MON_10AM_ET - 2 * 86_400 - 3600; // Saturday ~09:00 ET-ish
        let opened = next_open(saturday_morning);
        assert!(is_market_open(opened + 60));
    }
}
