//! Symbol Policy Table (C2).
//!
//! Static per-symbol thresholds and multipliers, loaded once from
//! configuration and validated eagerly: a single invalid entry rejects the
//! whole table rather than being silently clamped into range, mirroring the
//! `RiskConfig::sane_defaults()` / explicit-validation convention used by the
//! risk gate.

use std::collections::BTreeMap;
use std::fmt;

use qe_schemas::MICROS_SCALE;

/// Volatility regime a symbol is classified under; feeds the Confidence
/// Engine's "momentum strength" and "volatility match" component bands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum VolatilityProfile {
    LowStable,
    LowTech,
    ModerateFintech,
    ModerateEV,
    ModerateLeveraged,
    HighVolatility,
}

impl VolatilityProfile {
    /// Exact configuration-layer spelling. `FromStr` rejects anything else
    /// rather than guessing a nearest band.
    pub fn as_config_str(self) -> &'static str {
        match self {
            VolatilityProfile::LowStable => "LowStable",
            VolatilityProfile::LowTech => "LowTech",
            VolatilityProfile::ModerateFintech => "ModerateFintech",
            VolatilityProfile::ModerateEV => "ModerateEV",
            VolatilityProfile::ModerateLeveraged => "ModerateLeveraged",
            VolatilityProfile::HighVolatility => "HighVolatility",
        }
    }
}

impl std::str::FromStr for VolatilityProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LowStable" => Ok(VolatilityProfile::LowStable),
            "LowTech" => Ok(VolatilityProfile::LowTech),
            "ModerateFintech" => Ok(VolatilityProfile::ModerateFintech),
            "ModerateEV" => Ok(VolatilityProfile::ModerateEV),
            "ModerateLeveraged" => Ok(VolatilityProfile::ModerateLeveraged),
            "HighVolatility" => Ok(VolatilityProfile::HighVolatility),
            other => Err(format!(
                "unrecognized volatility profile '{other}' (expected one of LowStable, LowTech, ModerateFintech, ModerateEV, ModerateLeveraged, HighVolatility)"
            )),
        }
    }
}

/// Per-symbol thresholds and multipliers, frozen into each `Position` at
/// entry so a later policy reload never changes the semantics of an already
/// open position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SymbolPolicy {
    /// Stop distance from entry, micros-scaled fraction (e.g. 15_000 = 1.5%).
    pub stop_pct_micros: i64,
    /// Take-profit distance from entry, micros-scaled fraction.
    pub target_pct_micros: i64,
    /// Profit fraction at which the trailing stop arms.
    pub trail_activation_pct_micros: i64,
    /// Trail distance from the running high/low once armed.
    pub trail_distance_pct_micros: i64,
    /// Multiplies the Order Manager's computed share count.
    pub position_size_multiplier: f64,
    /// Multiplies the Confidence Engine's final score.
    pub confidence_multiplier: f64,
    pub volatility_profile: VolatilityProfile,
}

impl SymbolPolicy {
    pub fn default_policy() -> Self {
        Self {
            stop_pct_micros: pct_micros(1.5),
            target_pct_micros: pct_micros(2.0),
            trail_activation_pct_micros: pct_micros(1.0),
            trail_distance_pct_micros: pct_micros(1.5),
            position_size_multiplier: 1.0,
            confidence_multiplier: 1.0,
            volatility_profile: VolatilityProfile::HighVolatility,
        }
    }
}

/// `1.5` -> `15_000` (micros-scaled fraction: `pct / 100 * MICROS_SCALE`).
fn pct_micros(pct: f64) -> i64 {
    ((pct / 100.0) * MICROS_SCALE as f64).round() as i64
}

/// Construction-time validation failures. A table with any invalid entry is
/// rejected wholesale — a Configuration error that exits the process,
/// never a silent clamp.
#[derive(Debug)]
pub enum PolicyError {
    OutOfRange {
        symbol: String,
        field: &'static str,
        value: i64,
    },
    TrailActivationNotBelowTarget {
        symbol: String,
        trail_activation_pct_micros: i64,
        target_pct_micros: i64,
    },
    NonPositiveMultiplier {
        symbol: String,
        field: &'static str,
        value: f64,
    },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::OutOfRange {
                symbol,
                field,
                value,
            } => write!(f, "policy[{symbol}].{field} out of range: {value}"),
            PolicyError::TrailActivationNotBelowTarget {
                symbol,
                trail_activation_pct_micros,
                target_pct_micros,
            } => write!(
                f,
                "policy[{symbol}]: trail_activation_pct_micros ({trail_activation_pct_micros}) must be < target_pct_micros ({target_pct_micros})"
            ),
            PolicyError::NonPositiveMultiplier {
                symbol,
                field,
                value,
            } => write!(f, "policy[{symbol}].{field} must be > 0, got {value}"),
        }
    }
}

impl std::error::Error for PolicyError {}

/// Upper bound for any percent-valued policy field: 50%. Generous enough for
/// any realistic stop/target configuration, tight enough to catch a
/// misplaced decimal point (e.g. `1.5` entered as a raw fraction instead of
/// a percent) at load time instead of at the first bad trade.
const MAX_PCT_MICROS: i64 = 500_000;

fn validate_one(symbol: &str, p: &SymbolPolicy) -> Result<(), PolicyError> {
    for (field, value) in [
        ("stop_pct_micros", p.stop_pct_micros),
        ("target_pct_micros", p.target_pct_micros),
        ("trail_activation_pct_micros", p.trail_activation_pct_micros),
        ("trail_distance_pct_micros", p.trail_distance_pct_micros),
    ] {
        if value <= 0 || value > MAX_PCT_MICROS {
            return Err(PolicyError::OutOfRange {
                symbol: symbol.to_string(),
                field,
                value,
            });
        }
    }
    if p.trail_activation_pct_micros >= p.target_pct_micros {
        return Err(PolicyError::TrailActivationNotBelowTarget {
            symbol: symbol.to_string(),
            trail_activation_pct_micros: p.trail_activation_pct_micros,
            target_pct_micros: p.target_pct_micros,
        });
    }
    if p.position_size_multiplier <= 0.0 {
        return Err(PolicyError::NonPositiveMultiplier {
            symbol: symbol.to_string(),
            field: "position_size_multiplier",
            value: p.position_size_multiplier,
        });
    }
    if p.confidence_multiplier <= 0.0 {
        return Err(PolicyError::NonPositiveMultiplier {
            symbol: symbol.to_string(),
            field: "confidence_multiplier",
            value: p.confidence_multiplier,
        });
    }
    Ok(())
}

/// Loaded, validated symbol -> policy table. Read-only after construction.
#[derive(Clone, Debug)]
pub struct PolicyTable {
    default: SymbolPolicy,
    overrides: BTreeMap<String, SymbolPolicy>,
}

impl PolicyTable {
    /// Builds and validates the table. `overrides` need not cover the whole
    /// watchlist — `get()` falls back to `default_policy()` for any symbol
    /// absent here.
    pub fn build(overrides: BTreeMap<String, SymbolPolicy>) -> Result<Self, PolicyError> {
        let default = SymbolPolicy::default_policy();
        validate_one("__default__", &default).expect("built-in default policy must be valid");
        for (symbol, policy) in &overrides {
            validate_one(symbol, policy)?;
        }
        Ok(Self { default, overrides })
    }

    pub fn get(&self, symbol: &str) -> SymbolPolicy {
        self.overrides.get(symbol).copied().unwrap_or(self.default)
    }
}
