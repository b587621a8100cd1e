use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use qe_policy::{SymbolPolicy, VolatilityProfile};

/// Typed view of the configuration surface named in §6: everything the
/// engine reads to decide watchlist, cadence, thresholds, and risk limits.
/// Broker credentials are deliberately absent — those come from process
/// environment only, never from a YAML layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub watchlist: Vec<String>,

    #[serde(default = "default_cycle_interval_seconds")]
    pub cycle_interval_seconds: u64,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    #[serde(default)]
    pub risk: RiskLimits,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    #[serde(default = "default_order_timeout_seconds")]
    pub order_timeout_seconds: u64,

    #[serde(default = "default_data_timeout_seconds")]
    pub data_timeout_seconds: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub symbol_policies: BTreeMap<String, SymbolPolicyOverride>,

    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_trading_window_start")]
    pub trading_window_start: String,
    #[serde(default = "default_trading_window_end")]
    pub trading_window_end: String,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            trading_window_start: default_trading_window_start(),
            trading_window_end: default_trading_window_end(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    #[serde(default = "default_max_position_notional_micros")]
    pub max_position_notional_micros: i64,
    #[serde(default = "default_max_short_exposure_micros")]
    pub max_short_exposure_micros: i64,
    #[serde(default = "default_max_concurrent_positions")]
    pub max_concurrent_positions: u32,
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
    #[serde(default = "default_daily_loss_cap_micros")]
    pub daily_loss_cap_micros: i64,
    #[serde(default = "default_account_risk_per_trade")]
    pub account_risk_per_trade: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_notional_micros: default_max_position_notional_micros(),
            max_short_exposure_micros: default_max_short_exposure_micros(),
            max_concurrent_positions: default_max_concurrent_positions(),
            max_daily_trades: default_max_daily_trades(),
            daily_loss_cap_micros: default_daily_loss_cap_micros(),
            account_risk_per_trade: default_account_risk_per_trade(),
        }
    }
}

/// Per-symbol overrides layered onto the §4.2 default policy. Any field left
/// absent in YAML falls back to the table default, not to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolPolicyOverride {
    pub stop_pct: Option<f64>,
    pub target_pct: Option<f64>,
    pub trail_activation_pct: Option<f64>,
    pub trail_distance_pct: Option<f64>,
    pub position_size_multiplier: Option<f64>,
    pub confidence_multiplier: Option<f64>,
    pub volatility_profile: Option<String>,
}

fn default_cycle_interval_seconds() -> u64 {
    60
}
fn default_min_confidence() -> f64 {
    75.0
}
fn default_shutdown_grace_seconds() -> u64 {
    30
}
fn default_order_timeout_seconds() -> u64 {
    10
}
fn default_data_timeout_seconds() -> u64 {
    5
}
fn default_max_retries() -> u32 {
    3
}
fn default_trading_window_start() -> String {
    "10:00".to_string()
}
fn default_trading_window_end() -> String {
    "15:30".to_string()
}
fn default_max_position_notional_micros() -> i64 {
    10_000 * 1_000_000
}
fn default_max_short_exposure_micros() -> i64 {
    50_000 * 1_000_000
}
fn default_max_concurrent_positions() -> u32 {
    10
}
fn default_max_daily_trades() -> u32 {
    6
}
fn default_daily_loss_cap_micros() -> i64 {
    5_000 * 1_000_000
}
fn default_account_risk_per_trade() -> f64 {
    0.01
}

/// Configuration errors are surfaced at startup and exit the process
/// (exit code 1 per §6) — they are never retried.
#[derive(Debug)]
pub enum ConfigError {
    Deserialize(serde_json::Error),
    EmptyWatchlist,
    InvalidThreshold { field: &'static str, value: f64 },
    UnknownVolatilityProfile { symbol: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Deserialize(e) => write!(f, "config deserialize failed: {e}"),
            ConfigError::EmptyWatchlist => write!(f, "watchlist must not be empty"),
            ConfigError::InvalidThreshold { field, value } => {
                write!(f, "invalid threshold '{field}': {value}")
            }
            ConfigError::UnknownVolatilityProfile { symbol, value } => write!(
                f,
                "symbol_policies[{symbol}].volatility_profile '{value}' is not one of LowStable, LowTech, ModerateFintech, ModerateEV, ModerateLeveraged, HighVolatility"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    /// Deserialize + validate the typed surface out of a merged config
    /// value (normally `LoadedConfig::config_json` from `load_layered_yaml`).
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let cfg: EngineConfig =
            serde_json::from_value(value.clone()).map_err(ConfigError::Deserialize)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.watchlist.is_empty() {
            return Err(ConfigError::EmptyWatchlist);
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidThreshold {
                field: "min_confidence",
                value: self.min_confidence,
            });
        }
        if self.risk.account_risk_per_trade <= 0.0 || self.risk.account_risk_per_trade > 1.0 {
            return Err(ConfigError::InvalidThreshold {
                field: "account_risk_per_trade",
                value: self.risk.account_risk_per_trade,
            });
        }
        Ok(())
    }
}

/// `1.5` -> `15_000` (micros-scaled fraction: `pct / 100 * MICROS_SCALE`).
fn pct_micros(pct: f64) -> i64 {
    ((pct / 100.0) * qe_schemas::MICROS_SCALE as f64).round() as i64
}

/// Converts the config-layer `symbol_policies` map into the Symbol Policy
/// Table's domain type, applying each override onto `SymbolPolicy::default_policy()`.
/// An unrecognized `volatility_profile` name is rejected here rather than
/// silently folded into a default band — the caller should treat this the
/// same as any other `ConfigError` (surfaced at startup, process exits).
pub fn resolve_symbol_policies(
    overrides: &BTreeMap<String, SymbolPolicyOverride>,
) -> Result<BTreeMap<String, SymbolPolicy>, ConfigError> {
    let mut resolved = BTreeMap::new();
    for (symbol, ov) in overrides {
        let mut policy = SymbolPolicy::default_policy();
        if let Some(v) = ov.stop_pct {
            policy.stop_pct_micros = pct_micros(v);
        }
        if let Some(v) = ov.target_pct {
            policy.target_pct_micros = pct_micros(v);
        }
        if let Some(v) = ov.trail_activation_pct {
            policy.trail_activation_pct_micros = pct_micros(v);
        }
        if let Some(v) = ov.trail_distance_pct {
            policy.trail_distance_pct_micros = pct_micros(v);
        }
        if let Some(v) = ov.position_size_multiplier {
            policy.position_size_multiplier = v;
        }
        if let Some(v) = ov.confidence_multiplier {
            policy.confidence_multiplier = v;
        }
        if let Some(v) = &ov.volatility_profile {
            policy.volatility_profile =
                VolatilityProfile::from_str(v).map_err(|_| ConfigError::UnknownVolatilityProfile {
                    symbol: symbol.clone(),
                    value: v.clone(),
                })?;
        }
        resolved.insert(symbol.clone(), policy);
    }
    Ok(resolved)
}

#[cfg(test)]
mod resolve_tests {
    use super::*;

    #[test]
    fn unrecognized_volatility_profile_is_rejected() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "NIO".to_string(),
            SymbolPolicyOverride {
                stop_pct: None,
                target_pct: None,
                trail_activation_pct: None,
                trail_distance_pct: None,
                position_size_multiplier: None,
                confidence_multiplier: None,
                volatility_profile: Some("Moderate".to_string()),
            },
        );
        let err = resolve_symbol_policies(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVolatilityProfile { .. }));
    }

    #[test]
    fn all_six_named_profiles_are_recognized() {
        for name in [
            "LowStable",
            "LowTech",
            "ModerateFintech",
            "ModerateEV",
            "ModerateLeveraged",
            "HighVolatility",
        ] {
            let mut overrides = BTreeMap::new();
            overrides.insert(
                "SYM".to_string(),
                SymbolPolicyOverride {
                    stop_pct: None,
                    target_pct: None,
                    trail_activation_pct: None,
                    trail_distance_pct: None,
                    position_size_multiplier: None,
                    confidence_multiplier: None,
                    volatility_profile: Some(name.to_string()),
                },
            );
            resolve_symbol_policies(&overrides)
                .unwrap_or_else(|e| panic!("{name} should parse: {e}"));
        }
    }
}
