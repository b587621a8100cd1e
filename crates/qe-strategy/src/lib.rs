//! Strategy Set (C6).
//!
//! Three strategies — mean reversion, momentum scalp, VWAP bounce — each a
//! stateless `(snapshot, policy, openPosition?) -> Option<Signal>` function.
//! `StrategyHost` holds all of them behind `Vec<Box<dyn Strategy>>` and polls
//! every one once per symbol per cycle; `PluginRegistry` is the catalogue a
//! caller builds a host from by name.

mod host;
mod mean_reversion;
mod momentum_scalp;
mod plugin_registry;
mod types;
mod vwap_bounce;

pub use host::*;
pub use mean_reversion::MeanReversionStrategy;
pub use momentum_scalp::MomentumScalpStrategy;
pub use plugin_registry::{PluginRegistry, RegistryError, StrategyFactory, StrategyMeta};
pub use types::*;
pub use vwap_bounce::VwapBounceStrategy;

/// Build the default host with all three production strategies registered.
pub fn default_host(shadow: ShadowMode) -> StrategyHost {
    let mut host = StrategyHost::new(shadow);
    host.register(Box::new(MeanReversionStrategy));
    host.register(Box::new(MomentumScalpStrategy));
    host.register(Box::new(VwapBounceStrategy));
    host
}
