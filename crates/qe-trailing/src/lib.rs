//! Trailing Stop Manager (C9).
//!
//! A pure deterministic evaluator over `(&TrailingConfig, &mut TrailingState,
//! PriceUpdate) -> TrailingDecision`, in the same no-IO/no-clock/no-randomness
//! style as the risk gate's `evaluate()`: every branch returns an explicit
//! decision value rather than mutating shared state and separately
//! signalling, so "did this position actually decide to exit" is a single
//! type-checked return path. The state itself is the `Initial ->
//! TrailingArmed -> Triggered` machine, modeled the same way the OMS
//! lifecycle is modeled: explicit states, explicit events, and an error for
//! anything asked of a terminal state.

use qe_schemas::{PositionSide, MICROS_SCALE};

/// `0.5%` expressed as a micros-scaled fraction — the minimum improvement
/// required before an already-armed trail is allowed to ratchet further.
/// Applied symmetrically to long and short trailing.
pub const MIN_MOVE_PCT_MICROS: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingStateKind {
    Initial,
    TrailingArmed,
    Triggered,
}

/// Per-position trailing configuration, copied out of the `SymbolPolicy` in
/// effect at entry so a later policy reload never changes an open
/// position's semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingConfig {
    pub side: PositionSide,
    pub trail_activation_pct_micros: i64,
    pub trail_distance_pct_micros: i64,
}

/// Construction-time validation failure: a non-positive entry price can
/// never be protected by a percentage-based stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidEntryPrice {
    pub entry_price_micros: i64,
}

impl std::fmt::Display for InvalidEntryPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "entry price must be positive, got {} micros",
            self.entry_price_micros
        )
    }
}

impl std::error::Error for InvalidEntryPrice {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingState {
    pub kind: TrailingStateKind,
    pub entry_price_micros: i64,
    pub highest_price_micros: i64,
    pub lowest_price_micros: i64,
    pub current_stop_price_micros: i64,
    pub take_profit_price_micros: i64,
    pub trailing_stop_price_micros: Option<i64>,
}

impl TrailingState {
    /// Constructs the `Initial` state for a freshly opened position. Rejects
    /// a zero or negative entry price — invalid at position creation per the
    /// trailing-stop design's tie-break rule.
    pub fn new(
        entry_price_micros: i64,
        current_stop_price_micros: i64,
        take_profit_price_micros: i64,
    ) -> Result<Self, InvalidEntryPrice> {
        if entry_price_micros <= 0 {
            return Err(InvalidEntryPrice {
                entry_price_micros,
            });
        }
        Ok(Self {
            kind: TrailingStateKind::Initial,
            entry_price_micros,
            highest_price_micros: entry_price_micros,
            lowest_price_micros: entry_price_micros,
            current_stop_price_micros,
            take_profit_price_micros,
            trailing_stop_price_micros: None,
        })
    }

    /// Recovery path (§4.10/§4.11): reconstructs state from the *current*
    /// extreme rather than resetting to entry, and pre-evaluates whether
    /// trailing should already be armed given that extreme — never leaves a
    /// profitable recovered position unprotected.
    pub fn recover(
        cfg: &TrailingConfig,
        entry_price_micros: i64,
        current_price_micros: i64,
        current_stop_price_micros: i64,
        take_profit_price_micros: i64,
    ) -> Result<Self, InvalidEntryPrice> {
        if entry_price_micros <= 0 {
            return Err(InvalidEntryPrice {
                entry_price_micros,
            });
        }
        let extreme = match cfg.side {
            PositionSide::Long => entry_price_micros.max(current_price_micros),
            PositionSide::Short => entry_price_micros.min(current_price_micros),
        };
        let mut state = Self {
            kind: TrailingStateKind::Initial,
            entry_price_micros,
            highest_price_micros: extreme,
            lowest_price_micros: extreme,
            current_stop_price_micros,
            take_profit_price_micros,
            trailing_stop_price_micros: None,
        };

        let profit_pct = profit_pct_micros(cfg.side, entry_price_micros, extreme);
        if profit_pct >= cfg.trail_activation_pct_micros {
            let candidate = trail_candidate(cfg, extreme);
            state.kind = TrailingStateKind::TrailingArmed;
            state.trailing_stop_price_micros = Some(candidate);
            state.current_stop_price_micros = tighten(cfg.side, state.current_stop_price_micros, candidate);
        }
        Ok(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceUpdate {
    pub price_micros: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingDecision {
    /// No exit; stop/target unchanged.
    HoldStop,
    /// No exit; the trail just armed or ratcheted to a new stop price.
    TrailArmed { new_stop_price_micros: i64 },
    /// Exit: protective stop hit (or both stop and target crossed in the
    /// same update — the tie-break always resolves this way).
    StopTriggered,
    /// Exit: take-profit hit while not yet trailing-armed.
    TargetReached,
}

/// `(p - entry) / entry` for long, `(entry - p) / entry` for short, in
/// micros. `i128` intermediate, saturating clamp to `i64`.
fn profit_pct_micros(side: PositionSide, entry_price_micros: i64, p: i64) -> i64 {
    let diff = match side {
        PositionSide::Long => p as i128 - entry_price_micros as i128,
        PositionSide::Short => entry_price_micros as i128 - p as i128,
    };
    let scaled = diff * MICROS_SCALE as i128 / entry_price_micros as i128;
    scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// `highest * (1 - trail_distance_pct)` for long, `lowest * (1 +
/// trail_distance_pct)` for short.
fn trail_candidate(cfg: &TrailingConfig, extreme_micros: i64) -> i64 {
    let factor = match cfg.side {
        PositionSide::Long => MICROS_SCALE as i128 - cfg.trail_distance_pct_micros as i128,
        PositionSide::Short => MICROS_SCALE as i128 + cfg.trail_distance_pct_micros as i128,
    };
    let scaled = extreme_micros as i128 * factor / MICROS_SCALE as i128;
    scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Raises the long stop / lowers the short stop to `candidate` only if that
/// tightens protection.
fn tighten(side: PositionSide, current: i64, candidate: i64) -> i64 {
    match side {
        PositionSide::Long => current.max(candidate),
        PositionSide::Short => current.min(candidate),
    }
}

/// `true` if `candidate` improves on `current` by at least `MIN_MOVE_PCT_MICROS`
/// relative to `entry_price_micros`.
fn improves_by_min_move(side: PositionSide, entry_price_micros: i64, current: i64, candidate: i64) -> bool {
    let delta = match side {
        PositionSide::Long => candidate as i128 - current as i128,
        PositionSide::Short => current as i128 - candidate as i128,
    };
    if delta <= 0 {
        return false;
    }
    let delta_pct = delta * MICROS_SCALE as i128 / entry_price_micros as i128;
    delta_pct >= MIN_MOVE_PCT_MICROS as i128
}

fn stop_hit(side: PositionSide, p: i64, stop: i64) -> bool {
    match side {
        PositionSide::Long => p <= stop,
        PositionSide::Short => p >= stop,
    }
}

fn target_hit(side: PositionSide, p: i64, target: i64) -> bool {
    match side {
        PositionSide::Long => p >= target,
        PositionSide::Short => p <= target,
    }
}

/// Evaluates one price update against the trailing state machine.
pub fn evaluate(
    cfg: &TrailingConfig,
    state: &mut TrailingState,
    update: PriceUpdate,
) -> TrailingDecision {
    if state.kind == TrailingStateKind::Triggered {
        return TrailingDecision::StopTriggered;
    }

    let p = update.price_micros;
    match cfg.side {
        PositionSide::Long => state.highest_price_micros = state.highest_price_micros.max(p),
        PositionSide::Short => state.lowest_price_micros = state.lowest_price_micros.min(p),
    }
    let extreme = match cfg.side {
        PositionSide::Long => state.highest_price_micros,
        PositionSide::Short => state.lowest_price_micros,
    };

    let mut armed_this_update = false;
    if state.kind == TrailingStateKind::Initial {
        let profit_pct = profit_pct_micros(cfg.side, state.entry_price_micros, p);
        if profit_pct >= cfg.trail_activation_pct_micros {
            let candidate = trail_candidate(cfg, extreme);
            state.kind = TrailingStateKind::TrailingArmed;
            state.trailing_stop_price_micros = Some(candidate);
            state.current_stop_price_micros =
                tighten(cfg.side, state.current_stop_price_micros, candidate);
            armed_this_update = true;
        }
    } else if state.kind == TrailingStateKind::TrailingArmed {
        let candidate = trail_candidate(cfg, extreme);
        let current = state.trailing_stop_price_micros.unwrap_or(state.current_stop_price_micros);
        if improves_by_min_move(cfg.side, state.entry_price_micros, current, candidate) {
            state.trailing_stop_price_micros = Some(candidate);
            state.current_stop_price_micros =
                tighten(cfg.side, state.current_stop_price_micros, candidate);
            armed_this_update = true;
        }
    }

    // Tie-break: crossing both stop and target in the same update resolves
    // conservatively as StopTriggered.
    let stop_crossed = stop_hit(cfg.side, p, state.current_stop_price_micros);
    let target_crossed = state.kind != TrailingStateKind::TrailingArmed
        && target_hit(cfg.side, p, state.take_profit_price_micros);

    if stop_crossed {
        state.kind = TrailingStateKind::Triggered;
        return TrailingDecision::StopTriggered;
    }
    if target_crossed {
        state.kind = TrailingStateKind::Triggered;
        return TrailingDecision::TargetReached;
    }

    if armed_this_update {
        TrailingDecision::TrailArmed {
            new_stop_price_micros: state.current_stop_price_micros,
        }
    } else {
        TrailingDecision::HoldStop
    }
}
