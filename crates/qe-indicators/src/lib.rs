//! Indicator Service (C4): MACD, EMA9/21, RSI, VWAP, Bollinger, volume
//! ratio, and momentum, assembled once per (symbol, cycle) into an
//! `IndicatorSnapshot`.
//!
//! Each indicator is a free pure function over a bar slice, independently
//! testable against hand-computed reference values; `service` is the thin
//! orchestration layer that calls each one and owns the per-symbol cache.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod momentum;
pub mod rsi;
mod service;
pub mod volume;
pub mod vwap;

pub use service::{IndicatorService, InsufficientDataError, MIN_BARS};
