//! Layered YAML configuration loading + the typed engine configuration
//! surface (§6 of the design).
//!
//! `load_layered_yaml` merges one or more YAML documents (later layers
//! override earlier ones) into a single canonical, hash-stamped JSON value.
//! `EngineConfig::from_loaded` then deserializes the typed surface the rest
//! of the engine consumes out of that merged value.

mod engine_config;
mod loader;

pub use engine_config::{
    resolve_symbol_policies, ConfigError, EngineConfig, RiskLimits, SymbolPolicyOverride,
    Thresholds,
};
pub use loader::{load_layered_yaml, LoadedConfig};
