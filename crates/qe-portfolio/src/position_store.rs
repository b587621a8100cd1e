//! Position Store & Recovery (C10).
//!
//! Durable set of open positions, at most one per symbol (a symbol is never
//! simultaneously long and short in this engine, so the symbol alone is a
//! sufficient key). Mirrors the FIFO realized-PnL arithmetic in
//! `accounting.rs` — i128 intermediate multiply, saturating clamp to i64
//! micros — adapted to a single lot per symbol rather than a lot stack.
//!
//! Recovery (on process restart, or for a broker-reported orphan) never
//! resets `highest_price_micros`/`lowest_price_micros` to the entry price:
//! it reconstructs them from the *current* market price via
//! [`qe_trailing::TrailingState::recover`], so a profitable position comes
//! back already `TrailingArmed` rather than unprotected.

use std::collections::BTreeMap;

use qe_schemas::{CompletedTrade, ExitReason, Position, PositionSide, Symbol};
use qe_trailing::{InvalidEntryPrice, TrailingConfig, TrailingState, TrailingStateKind};

fn i128_to_i64_clamp(x: i128) -> i64 {
    x.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Realized PnL on a full close: `(exit - entry) * qty` for long,
/// `(entry - exit) * qty` for short.
fn realized_pnl_micros(pos: &Position, exit_price_micros: i64) -> i64 {
    let diff = match pos.side {
        PositionSide::Long => exit_price_micros as i128 - pos.entry_price_micros as i128,
        PositionSide::Short => pos.entry_price_micros as i128 - exit_price_micros as i128,
    };
    i128_to_i64_clamp(diff * pos.qty as i128)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionStoreError {
    AlreadyOpen { symbol: String },
    NotOpen { symbol: String },
}

impl std::fmt::Display for PositionStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionStoreError::AlreadyOpen { symbol } => {
                write!(f, "position already open for {symbol}")
            }
            PositionStoreError::NotOpen { symbol } => {
                write!(f, "no open position for {symbol}")
            }
        }
    }
}

impl std::error::Error for PositionStoreError {}

/// Recorded for anything the store does that a caller (audit log, operator
/// dashboard) may want to observe without polling `open_positions()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionEvent {
    Opened { symbol: String },
    Closed { symbol: String, reason: ExitReason },
    /// Reconstructed on boot from durable state.
    Recovered { symbol: String },
    /// Reconstructed from a broker-reported position this store had no
    /// record of (see the reconcile gate's phantom/orphan classification).
    OrphanRecovered { symbol: String },
    /// Deleted: the broker reports no position for a symbol this store
    /// believed open. Never produces a close order or a `CompletedTrade` —
    /// there was no real fill to account for.
    Phantom { symbol: String },
}

/// The single-owner store of open positions, and the append-only trade log
/// the EOD reporter (C12) reads from at session close.
#[derive(Debug, Default)]
pub struct PositionStore {
    open: BTreeMap<String, Position>,
    completed: Vec<CompletedTrade>,
    events: Vec<PositionEvent>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn get(&self, symbol: &str) -> Option<&Position> {
        self.open.get(symbol)
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.open.get_mut(symbol)
    }

    pub fn completed_trades(&self) -> &[CompletedTrade] {
        &self.completed
    }

    pub fn events(&self) -> &[PositionEvent] {
        &self.events
    }

    /// Registers a freshly opened position. Refuses if one is already open
    /// for this symbol — the Order Manager must close before re-entering.
    pub fn open_position(&mut self, position: Position) -> Result<(), PositionStoreError> {
        let key = position.symbol.0.clone();
        if self.open.contains_key(&key) {
            return Err(PositionStoreError::AlreadyOpen { symbol: key });
        }
        self.events.push(PositionEvent::Opened { symbol: key.clone() });
        self.open.insert(key, position);
        Ok(())
    }

    /// Closes an open position, computes realized PnL, and appends a
    /// `CompletedTrade` to the trade log.
    pub fn close_position(
        &mut self,
        symbol: &str,
        exit_price_micros: i64,
        exit_ts: i64,
        exit_reason: ExitReason,
    ) -> Result<CompletedTrade, PositionStoreError> {
        let pos = self
            .open
            .remove(symbol)
            .ok_or_else(|| PositionStoreError::NotOpen {
                symbol: symbol.to_string(),
            })?;
        let realized_pnl_micros = realized_pnl_micros(&pos, exit_price_micros);
        let trade = CompletedTrade {
            symbol: pos.symbol,
            side: pos.side,
            qty: pos.qty,
            entry_price_micros: pos.entry_price_micros,
            exit_price_micros,
            entry_ts: pos.entry_ts,
            exit_ts,
            realized_pnl_micros,
            exit_reason,
            confidence_at_entry: pos.confidence_at_entry,
            strategy: pos.strategy,
            initial_stop_price_micros: pos.initial_stop_price_micros,
        };
        self.events.push(PositionEvent::Closed {
            symbol: symbol.to_string(),
            reason: exit_reason,
        });
        self.completed.push(trade.clone());
        Ok(trade)
    }

    /// Deletes a phantom record: the broker disagrees that this symbol is
    /// open. No PnL is computed and no `CompletedTrade` is appended, since
    /// no real position ever existed to close.
    pub fn remove_phantom(&mut self, symbol: &str) -> Option<Position> {
        let removed = self.open.remove(symbol);
        if removed.is_some() {
            self.events.push(PositionEvent::Phantom {
                symbol: symbol.to_string(),
            });
        }
        removed
    }

    /// Reconstructs a `Position` from a broker-reported open position on
    /// boot, or for an orphan discovered mid-session. Never resets
    /// highs/lows to entry: the trailing state is derived from the current
    /// market price so a profitable position comes back already armed.
    #[allow(clippy::too_many_arguments)]
    pub fn recover_position(
        &mut self,
        symbol: Symbol,
        side: PositionSide,
        qty: i64,
        entry_price_micros: i64,
        entry_ts: i64,
        current_price_micros: i64,
        base_stop_price_micros: i64,
        take_profit_price_micros: i64,
        trail_cfg: &TrailingConfig,
        strategy: String,
        confidence_at_entry: f64,
        protective_stop_order_id: Option<String>,
        is_orphan: bool,
    ) -> Result<&Position, InvalidEntryPrice> {
        let tstate = TrailingState::recover(
            trail_cfg,
            entry_price_micros,
            current_price_micros,
            base_stop_price_micros,
            take_profit_price_micros,
        )?;

        let key = symbol.0.clone();
        let position = Position {
            symbol,
            side,
            qty,
            entry_price_micros,
            entry_ts,
            highest_price_micros: tstate.highest_price_micros,
            lowest_price_micros: tstate.lowest_price_micros,
            current_stop_price_micros: tstate.current_stop_price_micros,
            initial_stop_price_micros: base_stop_price_micros,
            take_profit_price_micros,
            trailing_active: tstate.kind == TrailingStateKind::TrailingArmed,
            trailing_stop_price_micros: tstate.trailing_stop_price_micros,
            strategy,
            confidence_at_entry,
            protective_stop_order_id,
        };

        self.events.push(if is_orphan {
            PositionEvent::OrphanRecovered { symbol: key.clone() }
        } else {
            PositionEvent::Recovered { symbol: key.clone() }
        });
        self.open.insert(key.clone(), position);
        Ok(self.open.get(&key).expect("just inserted"))
    }
}
