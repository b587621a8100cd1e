use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fixed-point scale for every money/price field in the workspace:
/// 1 unit of currency == `MICROS_SCALE` micros. All arithmetic on these
/// fields uses `i128` intermediates and clamps back to `i64` — never `f64`.
pub const MICROS_SCALE: i64 = 1_000_000;

/// Opaque uppercase ticker. Construction normalizes case so callers never
/// have to remember to `.to_uppercase()` before using a symbol as a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One OHLCV bar, already normalized to integer micros. Bars arrive
/// time-ordered per symbol; the Market Data Provider is responsible for
/// rejecting gaps and staleness before a `Bar` is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: Symbol,
    /// Bar close time, epoch seconds UTC.
    pub ts: i64,
    pub open_micros: i64,
    pub high_micros: i64,
    pub low_micros: i64,
    pub close_micros: i64,
    pub volume: i64,
}

/// Per-(symbol, cycle) indicator bundle. Every field is `None` when the
/// underlying window did not have enough bars to compute it; `None` on any
/// field the Confidence Engine needs forces `ConfidenceMode::Error`
/// downstream, never a default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: Symbol,
    pub ts: i64,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub ema9: Option<f64>,
    pub ema21: Option<f64>,
    pub rsi: Option<f64>,
    pub vwap: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
    pub volume: f64,
    pub avg_volume: Option<f64>,
    pub current_price: f64,
    pub momentum_30m: Option<f64>,
    pub momentum_1h: Option<f64>,
}

impl IndicatorSnapshot {
    /// `true` if every field the Confidence Engine's eight components read
    /// is present. A snapshot with any `None` here must be treated as
    /// `InsufficientDataError` by the caller, not silently partial-scored.
    pub fn is_complete(&self) -> bool {
        self.macd_line.is_some()
            && self.macd_signal.is_some()
            && self.ema9.is_some()
            && self.ema21.is_some()
            && self.rsi.is_some()
            && self.vwap.is_some()
            && self.bb_upper.is_some()
            && self.bb_lower.is_some()
            && self.avg_volume.is_some()
            && self.momentum_30m.is_some()
            && self.momentum_1h.is_some()
    }

    pub fn volume_ratio(&self) -> Option<f64> {
        let avg = self.avg_volume?;
        if avg <= 0.0 {
            return None;
        }
        Some(self.volume / avg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceMode {
    Computed,
    Error,
}

/// Output of the Confidence Engine (C5). A `mode = Error` result is REJECT
/// by construction — there is no field on this type that lets a caller
/// recover a usable score out of an errored result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceResult {
    pub symbol: Symbol,
    pub ts: i64,
    pub score: f64,
    pub components: BTreeMap<String, f64>,
    pub direction: Direction,
    pub mode: ConfidenceMode,
    pub reason: Option<String>,
}

impl ConfidenceResult {
    pub fn error(symbol: Symbol, ts: i64, reason: impl Into<String>) -> Self {
        Self {
            symbol,
            ts,
            score: 0.0,
            components: BTreeMap::new(),
            direction: Direction::Neutral,
            mode: ConfidenceMode::Error,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    SellToClose,
    Short,
    BuyToCover,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub action: SignalAction,
    pub strategy: String,
    pub proposed_qty: i64,
    pub limit_price_micros: Option<i64>,
    pub rationale: String,
    pub strategy_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    ConfidenceBelowThreshold,
    DirectionMismatch,
    ConfidenceError,
    MaxNotionalExceeded,
    MaxConcurrentPositionsExceeded,
    ShortExposureExceeded,
    DailyLossBreached,
    MaxDailyTradesExceeded,
    KillSwitchActive,
    DuplicateEntryThisCycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecision {
    pub signal: Signal,
    pub confidence: f64,
    pub threshold: f64,
    pub approved: bool,
    pub reject_reason: Option<RejectReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// One open position, one per (symbol, side). Mutated only by the Trailing
/// Stop Manager; created and destroyed by the Order Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: PositionSide,
    pub qty: i64,
    pub entry_price_micros: i64,
    pub entry_ts: i64,
    pub highest_price_micros: i64,
    pub lowest_price_micros: i64,
    pub current_stop_price_micros: i64,
    /// The stop distance set at entry (or reconstructed at recovery), fixed
    /// for the life of the position even once trailing moves
    /// `current_stop_price_micros` — the denominator for the R-multiple the
    /// EOD reporter computes per closed trade.
    pub initial_stop_price_micros: i64,
    pub take_profit_price_micros: i64,
    pub trailing_active: bool,
    pub trailing_stop_price_micros: Option<i64>,
    pub strategy: String,
    pub confidence_at_entry: f64,
    /// Internal order id of the resting protective stop placed with the
    /// broker at entry. `None` for a position recovered from a snapshot
    /// written before this field existed, or while the close that cancels
    /// it is in flight.
    pub protective_stop_order_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopTriggered,
    TargetReached,
    SignalExit,
    SessionEnd,
    ForceFlatten,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedTrade {
    pub symbol: Symbol,
    pub side: PositionSide,
    pub qty: i64,
    pub entry_price_micros: i64,
    pub exit_price_micros: i64,
    pub entry_ts: i64,
    pub exit_ts: i64,
    pub realized_pnl_micros: i64,
    pub exit_reason: ExitReason,
    pub confidence_at_entry: f64,
    pub strategy: String,
    /// Copied from `Position::initial_stop_price_micros` at close time; the
    /// denominator for the EOD reporter's R-multiple.
    pub initial_stop_price_micros: i64,
}
