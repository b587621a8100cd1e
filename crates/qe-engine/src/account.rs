//! Account/equity view.
//!
//! The broker adapter ([`qe_broker_paper::PaperBroker`]) models orders,
//! fills and positions, but has no notion of equity or cash — there is
//! nothing in the paper broker to read current buying power off. The risk
//! engine (C7) needs `equity_micros` every cycle, so the engine owns a
//! small account ledger: start from a configured equity, apply every
//! realized P&L as trades close.

use std::sync::atomic::{AtomicI64, Ordering};

use qe_schemas::CompletedTrade;

/// Read/update access to account equity. A live broker integration would
/// implement this by polling `BrokerAccount.equity`; the paper broker has
/// no such figure, so `PaperAccount` is the only implementation today.
pub trait AccountView: Send + Sync {
    fn equity_micros(&self) -> i64;
    fn apply_realized_pnl(&self, pnl_micros: i64);
}

/// In-memory equity ledger seeded from a starting balance, updated as
/// trades close. Not persisted across restarts on its own — callers that
/// need equity to survive a crash should replay `TradeLog::all()` against
/// a fresh `PaperAccount::new(starting_equity_micros)` on boot.
pub struct PaperAccount {
    equity_micros: AtomicI64,
}

impl PaperAccount {
    pub fn new(starting_equity_micros: i64) -> Self {
        Self {
            equity_micros: AtomicI64::new(starting_equity_micros),
        }
    }

    /// Rebuild equity by replaying a trade log from a known starting
    /// balance — used on daemon restart before the first cycle runs.
    pub fn from_trade_history(starting_equity_micros: i64, trades: &[CompletedTrade]) -> Self {
        let account = Self::new(starting_equity_micros);
        for trade in trades {
            account.apply_realized_pnl(trade.realized_pnl_micros);
        }
        account
    }
}

impl AccountView for PaperAccount {
    fn equity_micros(&self) -> i64 {
        self.equity_micros.load(Ordering::SeqCst)
    }

    fn apply_realized_pnl(&self, pnl_micros: i64) {
        self.equity_micros
            .fetch_add(pnl_micros, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qe_schemas::{ExitReason, PositionSide, Symbol};

    fn trade(pnl: i64) -> CompletedTrade {
        CompletedTrade {
            symbol: Symbol::new("AAPL"),
            side: PositionSide::Long,
            qty: 10,
            entry_price_micros: 100_000_000,
            exit_price_micros: 100_000_000 + pnl / 10,
            entry_ts: 1,
            exit_ts: 2,
            realized_pnl_micros: pnl,
            exit_reason: ExitReason::TargetReached,
            confidence_at_entry: 80.0,
            strategy: "mean_reversion".to_string(),
            initial_stop_price_micros: 98_000_000,
        }
    }

    #[test]
    fn starts_at_configured_equity() {
        let account = PaperAccount::new(100_000_000_000);
        assert_eq!(account.equity_micros(), 100_000_000_000);
    }

    #[test]
    fn realized_pnl_accumulates() {
        let account = PaperAccount::new(100_000_000_000);
        account.apply_realized_pnl(5_000_000);
        account.apply_realized_pnl(-2_000_000);
        assert_eq!(account.equity_micros(), 100_003_000_000);
    }

    #[test]
    fn from_trade_history_replays_every_trade() {
        let trades = vec![trade(5_000_000), trade(-1_000_000), trade(2_000_000)];
        let account = PaperAccount::from_trade_history(100_000_000_000, &trades);
        assert_eq!(account.equity_micros(), 100_006_000_000);
    }
}
