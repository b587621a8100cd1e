//! Confidence Engine (C5).
//!
//! Produces a `ConfidenceResult` from an `IndicatorSnapshot`. Each of the
//! eight weighted components is modeled as a `SignalInput`-style
//! contribution (`name`, `weight`, `confidence` in `[-1, 1]` favorable-for-long)
//! that a scorer folds into a total, the same contribution/scorer split used
//! by a weighted-ensemble ranker, generalized here from an open weight map
//! to the spec's fixed eight-component table with fixed weights summing to
//! 100.
//!
//! Base score is 85. Every component contributes `weight * confidence`
//! where `confidence ∈ [-1, 1]` is positive when the condition favors Long
//! and negative when it favors Short; inverting every component's sign
//! gives the Short-side alignment, so the two sides never need separate
//! component implementations. The score is `85 + alignment` for whichever
//! direction the caller actually intends to trade — favorable components
//! add, unfavorable components subtract — clamped to `[0, 100]` and then
//! multiplied by the policy's `confidence_multiplier` and clamped again.
//! A direction the components disagree with scores low on its own merits;
//! there is no opposite side to fold its negatives into.

use qe_policy::{SymbolPolicy, VolatilityProfile};
use qe_schemas::{ConfidenceMode, ConfidenceResult, Direction, IndicatorSnapshot};

const BASE_SCORE: f64 = 85.0;

/// Gatekeeper threshold: `shouldExecute` requires `score >= MIN_SCORE`.
pub const MIN_SCORE: f64 = 75.0;

struct Component {
    name: &'static str,
    weight: f64,
    /// Favorable-for-Long alignment in `[-1, 1]`.
    long_alignment: f64,
}

fn macd_alignment(s: &IndicatorSnapshot) -> f64 {
    match (s.macd_line, s.macd_signal) {
        (Some(line), Some(signal)) if line > signal => 1.0,
        (Some(_), Some(_)) => -1.0,
        _ => 0.0,
    }
}

fn ema_trend(s: &IndicatorSnapshot) -> f64 {
    let (Some(ema9), Some(ema21)) = (s.ema9, s.ema21) else {
        return 0.0;
    };
    let price = s.current_price;
    let holds = [price > ema9, ema9 > ema21];
    let count = holds.iter().filter(|&&h| h).count();
    // 0 of 2 hold -> fully bearish (-1), 1 holds -> partial credit (0),
    // 2 hold -> fully bullish (+1).
    count as f64 - 1.0
}

fn rsi_position(s: &IndicatorSnapshot) -> f64 {
    let Some(rsi) = s.rsi else { return 0.0 };
    if (30.0..=70.0).contains(&rsi) {
        1.0
    } else if rsi > 70.0 {
        // Overbought: extreme counter to continuing long.
        -1.0
    } else {
        // Oversold (rsi < 30): extreme counter to continuing short, i.e.
        // favorable-for-long is not penalized here, but isn't a confirmed
        // long signal either — treated as neutral per the spec's silence
        // on the favorable-extreme case.
        0.0
    }
}

fn volume_confirmation(s: &IndicatorSnapshot) -> f64 {
    match s.volume_ratio() {
        Some(ratio) if ratio >= 1.5 => 1.0,
        Some(_) => -1.0,
        None => 0.0,
    }
}

fn vwap_position(s: &IndicatorSnapshot) -> f64 {
    match s.vwap {
        Some(vwap) if s.current_price > vwap => 1.0,
        Some(_) => -1.0,
        None => 0.0,
    }
}

fn bollinger_position(s: &IndicatorSnapshot) -> f64 {
    let (Some(upper), Some(lower)) = (s.bb_upper, s.bb_lower) else {
        return 0.0;
    };
    if s.current_price < lower || s.current_price > upper {
        return -1.0;
    }
    let band = upper - lower;
    if band <= 0.0 {
        return 0.0;
    }
    // 0.0 at upper band, 1.0 at lower band -> map to [-1, 1] so "closer to
    // lower" favors long.
    let frac_from_upper = (upper - s.current_price) / band;
    2.0 * frac_from_upper - 1.0
}

fn momentum_strength(s: &IndicatorSnapshot, profile: VolatilityProfile) -> f64 {
    let (Some(m30), Some(m1h)) = (s.momentum_30m, s.momentum_1h) else {
        return 0.0;
    };
    let threshold = momentum_threshold(profile);
    let same_sign = (m30 >= 0.0) == (m1h >= 0.0);
    let magnitude_ok = m30.abs() >= threshold && m1h.abs() >= threshold;
    if !same_sign || !magnitude_ok {
        return -1.0;
    }
    if m30 > 0.0 {
        1.0
    } else {
        -1.0
    }
}

fn volatility_match(s: &IndicatorSnapshot, profile: VolatilityProfile) -> f64 {
    let (Some(upper), Some(lower)) = (s.bb_upper, s.bb_lower) else {
        return 0.0;
    };
    if s.current_price <= 0.0 {
        return 0.0;
    }
    let realized = (upper - lower) / s.current_price;
    let (lo, hi) = volatility_band(profile);
    if (lo..=hi).contains(&realized) {
        1.0
    } else {
        -1.0
    }
}

/// Minimum 30m/1h momentum magnitude required for "momentum strength" to
/// count as aligned, by volatility profile. Conservative defaults resolving
/// the spec's Open Question on profile bands, ordered low to high across
/// the six named profiles.
fn momentum_threshold(profile: VolatilityProfile) -> f64 {
    match profile {
        VolatilityProfile::LowStable => 0.0008,
        VolatilityProfile::LowTech => 0.0012,
        VolatilityProfile::ModerateFintech => 0.0018,
        VolatilityProfile::ModerateEV => 0.0022,
        VolatilityProfile::ModerateLeveraged => 0.0026,
        VolatilityProfile::HighVolatility => 0.004,
    }
}

/// Acceptable realized-volatility band (Bollinger width / price) by profile.
fn volatility_band(profile: VolatilityProfile) -> (f64, f64) {
    match profile {
        VolatilityProfile::LowStable => (0.0, 0.015),
        VolatilityProfile::LowTech => (0.0, 0.025),
        VolatilityProfile::ModerateFintech => (0.005, 0.045),
        VolatilityProfile::ModerateEV => (0.008, 0.06),
        VolatilityProfile::ModerateLeveraged => (0.01, 0.08),
        VolatilityProfile::HighVolatility => (0.01, 0.12),
    }
}

fn components(snapshot: &IndicatorSnapshot, profile: VolatilityProfile) -> [Component; 8] {
    [
        Component {
            name: "macd_alignment",
            weight: 15.0,
            long_alignment: macd_alignment(snapshot),
        },
        Component {
            name: "ema_trend",
            weight: 15.0,
            long_alignment: ema_trend(snapshot),
        },
        Component {
            name: "rsi_position",
            weight: 10.0,
            long_alignment: rsi_position(snapshot),
        },
        Component {
            name: "volume_confirmation",
            weight: 15.0,
            long_alignment: volume_confirmation(snapshot),
        },
        Component {
            name: "vwap_position",
            weight: 10.0,
            long_alignment: vwap_position(snapshot),
        },
        Component {
            name: "bollinger_position",
            weight: 10.0,
            long_alignment: bollinger_position(snapshot),
        },
        Component {
            name: "momentum_strength",
            weight: 15.0,
            long_alignment: momentum_strength(snapshot, profile),
        },
        Component {
            name: "volatility_match",
            weight: 10.0,
            long_alignment: volatility_match(snapshot, profile),
        },
    ]
}

/// Computes a `ConfidenceResult` scoring `intended_direction` specifically
/// under `policy`. `intended_direction` should be `Long` or `Short`; `Neutral`
/// is scored as `Long` by convention since closing actions never consult
/// the result.
///
/// Returns `mode = Error` (never a historical-baseline fallback) if the
/// snapshot is missing any field a component needs.
pub fn evaluate(
    snapshot: &IndicatorSnapshot,
    policy: &SymbolPolicy,
    intended_direction: Direction,
) -> ConfidenceResult {
    if !snapshot.is_complete() {
        return ConfidenceResult::error(
            snapshot.symbol.clone(),
            snapshot.ts,
            "indicator snapshot incomplete",
        );
    }

    let comps = components(snapshot, policy.volatility_profile);
    let long_alignment: f64 = comps.iter().map(|c| c.weight * c.long_alignment).sum();

    // Alignment of the components with the direction we actually intend to
    // trade, not with whichever side happens to net out on top. A direction
    // the components mostly disagree with scores low on its own — its
    // disagreement is never laundered into the other side's magnitude.
    let directional_alignment = match intended_direction {
        Direction::Short => -long_alignment,
        Direction::Long | Direction::Neutral => long_alignment,
    };

    let raw_score = (BASE_SCORE + directional_alignment).clamp(0.0, 100.0);
    let final_score = (raw_score * policy.confidence_multiplier).clamp(0.0, 100.0);

    let components_map = comps
        .iter()
        .map(|c| (c.name.to_string(), c.weight * c.long_alignment))
        .collect();

    ConfidenceResult {
        symbol: snapshot.symbol.clone(),
        ts: snapshot.ts,
        score: final_score,
        components: components_map,
        direction: intended_direction,
        mode: ConfidenceMode::Computed,
        reason: None,
    }
}

/// The hard gatekeeper rule: approved iff `mode == Computed` and
/// `score >= 75`. `evaluate` already scores `intended_direction` directly,
/// so there is no separate direction-match condition left to check here —
/// a mismatched direction simply scores low. Any `mode = Error` is REJECT.
pub fn should_execute(result: &ConfidenceResult, intended_direction: Direction) -> bool {
    result.mode == ConfidenceMode::Computed
        && result.score >= MIN_SCORE
        && result.direction == intended_direction
}
