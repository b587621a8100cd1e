//! Phantom/orphan position classification — deliberately distinct from the
//! drift-halt engine in `engine.rs`.
//!
//! `reconcile`/`reconcile_monotonic` treat any broker/local divergence as a
//! HALT condition. Position *presence* mismatches are recoverable instead:
//!
//! - Phantom: the internal book has a position the broker does not. The
//!   Order Manager deletes it and logs `PhantomDetected` — it never places a
//!   close order for a position the broker never held.
//! - Orphan: the broker holds a position the internal book has no record of.
//!   The Position Store reconstructs it (position recovery), it does not halt.
//! - Mismatch: both sides have the symbol open but at different signed
//!   quantities — neither phantom nor orphan; still needs a broker-is-truth
//!   resync but is reported separately so callers don't conflate it with a
//!   true discrepancy halt.
//!
//! Pure, deterministic; stable ordering via `BTreeMap` iteration.

use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PositionDiscrepancy {
    Phantom { symbol: String, local_qty: i64 },
    Orphan { symbol: String, broker_qty: i64 },
    Mismatch {
        symbol: String,
        local_qty: i64,
        broker_qty: i64,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PositionDiffReport {
    pub discrepancies: Vec<PositionDiscrepancy>,
}

impl PositionDiffReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }

    pub fn phantoms(&self) -> impl Iterator<Item = &PositionDiscrepancy> {
        self.discrepancies
            .iter()
            .filter(|d| matches!(d, PositionDiscrepancy::Phantom { .. }))
    }

    pub fn orphans(&self) -> impl Iterator<Item = &PositionDiscrepancy> {
        self.discrepancies
            .iter()
            .filter(|d| matches!(d, PositionDiscrepancy::Orphan { .. }))
    }
}

/// Classifies local vs broker positions (`symbol -> signed qty`) into
/// phantom / orphan / mismatch. A symbol present in both maps with equal
/// qty produces no discrepancy.
pub fn classify_positions(
    local: &BTreeMap<String, i64>,
    broker: &BTreeMap<String, i64>,
) -> PositionDiffReport {
    let mut discrepancies = Vec::new();

    for (symbol, &local_qty) in local {
        match broker.get(symbol) {
            None => discrepancies.push(PositionDiscrepancy::Phantom {
                symbol: symbol.clone(),
                local_qty,
            }),
            Some(&broker_qty) if broker_qty != local_qty => {
                discrepancies.push(PositionDiscrepancy::Mismatch {
                    symbol: symbol.clone(),
                    local_qty,
                    broker_qty,
                })
            }
            Some(_) => {}
        }
    }

    for (symbol, &broker_qty) in broker {
        if !local.contains_key(symbol) {
            discrepancies.push(PositionDiscrepancy::Orphan {
                symbol: symbol.clone(),
                broker_qty,
            });
        }
    }

    PositionDiffReport { discrepancies }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(items: &[(&str, i64)]) -> BTreeMap<String, i64> {
        items.iter().map(|(s, q)| (s.to_string(), *q)).collect()
    }

    #[test]
    fn matching_positions_are_clean() {
        let local = map(&[("AAPL", 10)]);
        let broker = map(&[("AAPL", 10)]);
        let report = classify_positions(&local, &broker);
        assert!(report.is_clean());
    }

    #[test]
    fn local_only_position_is_phantom() {
        let local = map(&[("AAPL", 10)]);
        let broker = map(&[]);
        let report = classify_positions(&local, &broker);
        assert_eq!(
            report.discrepancies,
            vec![PositionDiscrepancy::Phantom {
                symbol: "AAPL".to_string(),
                local_qty: 10,
            }]
        );
    }

    #[test]
    fn broker_only_position_is_orphan() {
        let local = map(&[]);
        let broker = map(&[("MSFT", -5)]);
        let report = classify_positions(&local, &broker);
        assert_eq!(
            report.discrepancies,
            vec![PositionDiscrepancy::Orphan {
                symbol: "MSFT".to_string(),
                broker_qty: -5,
            }]
        );
    }

    #[test]
    fn differing_qty_both_sides_is_mismatch() {
        let local = map(&[("AAPL", 10)]);
        let broker = map(&[("AAPL", 7)]);
        let report = classify_positions(&local, &broker);
        assert_eq!(
            report.discrepancies,
            vec![PositionDiscrepancy::Mismatch {
                symbol: "AAPL".to_string(),
                local_qty: 10,
                broker_qty: 7,
            }]
        );
    }

    #[test]
    fn mixed_book_reports_all_categories() {
        let local = map(&[("AAPL", 10), ("TSLA", 3)]);
        let broker = map(&[("AAPL", 10), ("MSFT", -5)]);
        let report = classify_positions(&local, &broker);
        assert_eq!(report.discrepancies.len(), 2);
        assert_eq!(report.phantoms().count(), 1);
        assert_eq!(report.orphans().count(), 1);
    }
}
