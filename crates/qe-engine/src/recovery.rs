//! Position Recovery (C10, on-wake path).
//!
//! Runs once at session start (or daemon restart): reconstructs every open
//! `Position` the process needs to keep trailing, by cross-referencing the
//! broker's position book (ground truth for *what* is open) against our own
//! persisted snapshots (ground truth for *how* it was opened — entry price,
//! strategy, confidence). A broker position with no matching snapshot is an
//! orphan: a real position with no known entry context, recovered with the
//! current price standing in for entry so trailing still arms sensibly.

use qe_policy::SymbolPolicy;
use qe_portfolio::PositionStore;
use qe_schemas::{PositionSide, Symbol};
use qe_trailing::TrailingConfig;

use crate::broker_reads::PositionsView;
use crate::persistence::PositionSnapshotStore;

/// Looks up the policy to use for a given symbol, falling back to the
/// default when no override is configured — same precedence `qe-policy`
/// uses everywhere else.
pub trait PolicyLookup {
    fn policy_for(&self, symbol: &str) -> SymbolPolicy;
}

fn trailing_config(side: PositionSide, policy: &SymbolPolicy) -> TrailingConfig {
    TrailingConfig {
        side,
        trail_activation_pct_micros: policy.trail_activation_pct_micros,
        trail_distance_pct_micros: policy.trail_distance_pct_micros,
    }
}

/// Recovers every currently-open broker position into `store`. Current
/// prices are supplied by the caller (one bar/quote fetch per symbol done
/// ahead of time) since this step has no business depending on the market
/// data provider's async lifetime directly.
pub fn recover_open_positions(
    store: &mut PositionStore,
    positions: &dyn PositionsView,
    snapshots: &dyn PositionSnapshotStore,
    policies: &dyn PolicyLookup,
    current_prices_micros: &std::collections::BTreeMap<String, i64>,
) -> anyhow::Result<Vec<String>> {
    let mut recovered = Vec::new();

    for (symbol_str, qty_signed) in positions.positions() {
        if qty_signed == 0 {
            continue;
        }
        let side = if qty_signed > 0 {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        let qty = qty_signed.abs();

        let Some(&current_price_micros) = current_prices_micros.get(&symbol_str) else {
            anyhow::bail!(
                "no current price available for broker-reported position {symbol_str}, cannot recover"
            );
        };

        let policy = policies.policy_for(&symbol_str);
        let trail_cfg = trailing_config(side, &policy);
        let symbol = Symbol::new(&symbol_str);

        let snapshot = snapshots.get(&symbol_str)?;
        let is_orphan = snapshot.is_none();

        let (entry_price_micros, entry_ts, base_stop_pct_from, take_profit_pct_from, strategy, confidence, protective_stop_order_id) =
            match &snapshot {
                Some(s) => (
                    s.entry_price_micros,
                    s.entry_ts,
                    s.entry_price_micros,
                    s.entry_price_micros,
                    s.strategy.clone(),
                    s.confidence_at_entry,
                    s.protective_stop_order_id.clone(),
                ),
                None => (
                    current_price_micros,
                    current_price_micros,
                    current_price_micros,
                    current_price_micros,
                    "orphan_recovery".to_string(),
                    0.0,
                    None,
                ),
            };

        let stop_offset =
            (base_stop_pct_from as i128 * policy.stop_pct_micros as i128 / qe_schemas::MICROS_SCALE as i128) as i64;
        let target_offset = (take_profit_pct_from as i128 * policy.target_pct_micros as i128
            / qe_schemas::MICROS_SCALE as i128) as i64;

        let (base_stop_price_micros, take_profit_price_micros) = match side {
            PositionSide::Long => (entry_price_micros - stop_offset, entry_price_micros + target_offset),
            PositionSide::Short => (entry_price_micros + stop_offset, entry_price_micros - target_offset),
        };

        store.recover_position(
            symbol,
            side,
            qty,
            entry_price_micros,
            entry_ts,
            current_price_micros,
            base_stop_price_micros,
            take_profit_price_micros,
            &trail_cfg,
            strategy,
            confidence,
            protective_stop_order_id,
            is_orphan,
        )?;

        recovered.push(symbol_str);
    }

    Ok(recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryPositionSnapshotStore, PositionSnapshot};
    use qe_reconcile::BrokerSnapshot;
    use std::collections::BTreeMap;

    struct FixedPolicies;
    impl PolicyLookup for FixedPolicies {
        fn policy_for(&self, _symbol: &str) -> SymbolPolicy {
            SymbolPolicy::default_policy()
        }
    }

    struct FakePositions {
        inner: BTreeMap<String, i64>,
    }
    impl PositionsView for FakePositions {
        fn positions(&self) -> BTreeMap<String, i64> {
            self.inner.clone()
        }
        fn broker_snapshot(&self) -> BrokerSnapshot {
            BrokerSnapshot::empty()
        }
    }

    #[test]
    fn recovers_known_position_from_snapshot() {
        let mut inner = BTreeMap::new();
        inner.insert("AAPL".to_string(), 100);
        let positions = FakePositions { inner };

        let snapshots = InMemoryPositionSnapshotStore::default();
        snapshots
            .put(
                "AAPL",
                &PositionSnapshot {
                    symbol: "AAPL".to_string(),
                    side: "long".to_string(),
                    qty: 100,
                    entry_price_micros: 100_000_000,
                    entry_ts: 1,
                    highest_price_micros: 100_000_000,
                    lowest_price_micros: 100_000_000,
                    current_stop_price_micros: 98_500_000,
                    initial_stop_price_micros: 98_500_000,
                    take_profit_price_micros: 102_000_000,
                    trailing_active: false,
                    trailing_stop_price_micros: None,
                    strategy: "mean_reversion".to_string(),
                    confidence_at_entry: 82.0,
                    protective_stop_order_id: Some("stop-aapl-1".to_string()),
                },
            )
            .unwrap();

        let mut store = PositionStore::new();
        let mut prices = BTreeMap::new();
        prices.insert("AAPL".to_string(), 101_000_000);

        let recovered =
            recover_open_positions(&mut store, &positions, &snapshots, &FixedPolicies, &prices).unwrap();

        assert_eq!(recovered, vec!["AAPL".to_string()]);
        let pos = store.get("AAPL").unwrap();
        assert_eq!(pos.qty, 100);
        assert_eq!(pos.entry_price_micros, 100_000_000);
        assert_eq!(pos.protective_stop_order_id.as_deref(), Some("stop-aapl-1"));
    }

    #[test]
    fn recovers_orphan_with_no_snapshot() {
        let mut inner = BTreeMap::new();
        inner.insert("MSFT".to_string(), -50);
        let positions = FakePositions { inner };
        let snapshots = InMemoryPositionSnapshotStore::default();

        let mut store = PositionStore::new();
        let mut prices = BTreeMap::new();
        prices.insert("MSFT".to_string(), 300_000_000);

        let recovered =
            recover_open_positions(&mut store, &positions, &snapshots, &FixedPolicies, &prices).unwrap();

        assert_eq!(recovered, vec!["MSFT".to_string()]);
        let pos = store.get("MSFT").unwrap();
        assert_eq!(pos.side, PositionSide::Short);
        assert_eq!(pos.qty, 50);
        assert_eq!(pos.strategy, "orphan_recovery");
    }
}
