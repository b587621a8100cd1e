//! Shared test fixtures (§8 test tooling): sample bar sequences, a fixed
//! deterministic clock, and a deterministic paper broker, so every crate's
//! scenario tests build their fixtures the same way instead of each
//! reinventing one.

use std::cell::Cell;

use qe_broker_paper::PaperBroker;
use qe_integrity::Clock;
use qe_schemas::{Bar, Symbol};

/// A `Clock` that never moves unless told to. Tests that need wall-clock
/// progression call `advance`; everything else just reads a fixed instant.
pub struct FixedClock {
    now: Cell<i64>,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn advance(&self, secs: i64) {
        self.now.set(self.now.get() + secs);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.get()
    }
}

/// A deterministic, strictly-increasing bar sequence for one symbol,
/// starting at `start_ts` and stepping `interval_secs` apart. `close_prices`
/// gives the close of each bar in order; open/high/low are derived as a
/// small fixed spread around it so every bar is well-formed without the
/// caller having to construct OHLC by hand. Volume is a fixed constant
/// unless `with_volume` is used.
pub fn sample_bars(
    symbol: &str,
    start_ts: i64,
    interval_secs: i64,
    close_prices_micros: &[i64],
) -> Vec<Bar> {
    let sym = Symbol::new(symbol);
    close_prices_micros
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let spread = close / 1000;
            Bar {
                symbol: sym.clone(),
                ts: start_ts + i as i64 * interval_secs,
                open_micros: close - spread,
                high_micros: close + spread,
                low_micros: close - spread,
                close_micros: close,
                volume: 100_000,
            }
        })
        .collect()
}

/// Same as [`sample_bars`] but with an explicit volume per bar, for tests
/// that exercise the volume-ratio / volume-confirmation indicators.
pub fn sample_bars_with_volume(
    symbol: &str,
    start_ts: i64,
    interval_secs: i64,
    close_prices_and_volume: &[(i64, i64)],
) -> Vec<Bar> {
    let sym = Symbol::new(symbol);
    close_prices_and_volume
        .iter()
        .enumerate()
        .map(|(i, &(close, volume))| {
            let spread = close / 1000;
            Bar {
                symbol: sym.clone(),
                ts: start_ts + i as i64 * interval_secs,
                open_micros: close - spread,
                high_micros: close + spread,
                low_micros: close - spread,
                close_micros: close,
                volume,
            }
        })
        .collect()
}

/// A freshly constructed paper broker with no open orders or positions —
/// the starting point every scenario test builds its broker-side state
/// from via `PaperBroker::set_position`/`submit`.
pub fn deterministic_paper_broker() -> PaperBroker {
    PaperBroker::new()
}
