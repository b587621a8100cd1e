//! Plugin Registry — catalogue of available strategies + metadata.
//!
//! # Purpose
//! [`StrategyHost`](crate::StrategyHost) holds the strategies currently
//! running. `PluginRegistry` is the step before that: a catalogue of
//! *available* strategies, each represented by:
//!
//! - [`StrategyMeta`] — static metadata (name, version, description).
//! - A [`StrategyFactory`] — a `Send + Sync` closure that produces a fresh
//!   `Box<dyn Strategy>` on demand.
//!
//! This separation means the runtime can enumerate registered strategies,
//! select one by name, instantiate it, and hand it to `StrategyHost::register`
//! without coupling discovery to execution.
//!
//! # Determinism
//! The registry itself is deterministic — insertion order is preserved in
//! `list()` output. Factory closures must be deterministic if reproducible
//! backtest replay is required.

use crate::{Strategy, StrategySpec};

pub type StrategyFactory = Box<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

/// Static metadata for a registered strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyMeta {
    /// Unique name used as the registry key.
    pub name: String,
    /// Semver-style version string. Not validated beyond non-empty.
    pub version: String,
    /// Human-readable description of the strategy.
    pub description: String,
}

impl StrategyMeta {
    pub fn new(name: impl Into<String>, version: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(!name.trim().is_empty(), "StrategyMeta name must not be empty");
        Self {
            name,
            version: version.into(),
            description: description.into(),
        }
    }

    /// Derive metadata directly from an instantiated strategy's spec.
    pub fn from_spec(spec: &StrategySpec, version: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: spec.name.clone(),
            version: version.into(),
            description: description.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateName { name: String },
    UnknownStrategy { name: String },
    EmptyName,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { name } => write!(f, "strategy '{name}' is already registered"),
            Self::UnknownStrategy { name } => write!(f, "no strategy named '{name}' is registered"),
            Self::EmptyName => write!(f, "strategy name must not be empty"),
        }
    }
}

impl std::error::Error for RegistryError {}

struct RegistryEntry {
    meta: StrategyMeta,
    factory: StrategyFactory,
}

/// Catalogue of available strategies and their factories.
///
/// Maintains insertion order for deterministic `list()` output.
/// Names are compared case-sensitively.
pub struct PluginRegistry {
    entries: Vec<RegistryEntry>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// # Errors
    /// - [`RegistryError::EmptyName`] if `meta.name` is empty/whitespace.
    /// - [`RegistryError::DuplicateName`] if a strategy with the same name is
    ///   already registered.
    pub fn register<F>(&mut self, meta: StrategyMeta, factory: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        if meta.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.contains(&meta.name) {
            return Err(RegistryError::DuplicateName { name: meta.name.clone() });
        }
        self.entries.push(RegistryEntry { meta, factory: Box::new(factory) });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.meta.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn list(&self) -> Vec<&StrategyMeta> {
        self.entries.iter().map(|e| &e.meta).collect()
    }

    /// # Errors
    /// [`RegistryError::UnknownStrategy`] if the name is not found.
    pub fn lookup(&self, name: &str) -> Result<&StrategyMeta, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.meta.name == name)
            .map(|e| &e.meta)
            .ok_or_else(|| RegistryError::UnknownStrategy { name: name.to_string() })
    }

    /// Instantiate a strategy by name using its registered factory.
    ///
    /// Each call produces a **fresh** instance — the factory is called anew
    /// every time.
    ///
    /// # Errors
    /// [`RegistryError::UnknownStrategy`] if the name is not found.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn Strategy>, RegistryError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.meta.name == name)
            .ok_or_else(|| RegistryError::UnknownStrategy { name: name.to_string() })?;
        Ok((entry.factory)())
    }

    /// Remove a registered strategy by name. Returns `true` if found.
    pub fn deregister(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.meta.name != name);
        self.entries.len() < before
    }

    /// Instantiate every registered strategy and hand them to a fresh host.
    pub fn build_host(&self, shadow: crate::ShadowMode) -> crate::StrategyHost {
        let mut host = crate::StrategyHost::new(shadow);
        for entry in &self.entries {
            host.register((entry.factory)());
        }
        host
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
