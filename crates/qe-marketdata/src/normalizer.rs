//! Canonical OHLCV normalization for market-data bars.
//!
//! This module converts raw provider bars (`provider::RawBar`) into
//! `NormalizedBar` values with integer-micro prices, validated OHLC
//! relationships, and deterministic sort order.
//!
//! It does **not**:
//! - fetch data (no providers)
//! - write to the database
//! - perform data-quality reporting (that is `quality.rs`)

use std::fmt;

use crate::provider::RawBar;

// ---------------------------------------------------------------------------
// Output type
// ---------------------------------------------------------------------------

/// A fully normalized OHLCV bar ready for downstream storage.
///
/// Prices are stored as integer micros (1 USD = 1_000_000 micros) to avoid
/// floating-point rounding at any later stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBar {
    pub symbol: String,
    /// Canonical timeframe string (e.g. `"1D"`, `"1m"`, `"5m"`).
    pub timeframe: String,
    /// Bar end timestamp as UTC epoch seconds.
    pub end_ts: i64,
    /// Opening price in micros (1/1_000_000 of the base currency unit).
    pub open_micros: i64,
    /// High price in micros.
    pub high_micros: i64,
    /// Low price in micros.
    pub low_micros: i64,
    /// Closing price in micros.
    pub close_micros: i64,
    /// Trade volume (integer shares / contracts).
    pub volume: i64,
    /// `true` when the bar period has fully closed.
    pub is_complete: bool,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced during normalization.
#[derive(Debug, PartialEq, Eq)]
pub enum NormalizerError {
    /// A price string was empty.
    EmptyPrice { field: &'static str },
    /// A price string could not be parsed as a decimal number.
    InvalidPrice { field: &'static str, raw: String },
    /// A price had more than 6 decimal places (ambiguous micro conversion).
    TooManyDecimalPlaces { field: &'static str, raw: String },
    /// OHLC sanity check failed.
    OhlcViolation(String),
    /// Volume is negative.
    NegativeVolume(i64),
}

impl fmt::Display for NormalizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizerError::EmptyPrice { field } => {
                write!(f, "price field '{field}' is empty")
            }
            NormalizerError::InvalidPrice { field, raw } => {
                write!(f, "price field '{field}' could not be parsed: '{raw}'")
            }
            NormalizerError::TooManyDecimalPlaces { field, raw } => {
                write!(
                    f,
                    "price field '{field}' has more than 6 decimal places \
                     (ambiguous micro conversion): '{raw}'"
                )
            }
            NormalizerError::OhlcViolation(msg) => {
                write!(f, "OHLC sanity violation: {msg}")
            }
            NormalizerError::NegativeVolume(v) => {
                write!(f, "volume must be >= 0, got {v}")
            }
        }
    }
}

impl std::error::Error for NormalizerError {}

// ---------------------------------------------------------------------------
// Price conversion
// ---------------------------------------------------------------------------

/// Convert a decimal price string to integer micros deterministically.
///
/// Rules:
/// - Accepts optional leading `+` or `-`.
/// - Accepts an optional fractional part separated by `.`.
/// - Rejects strings with more than 6 decimal places (would require rounding).
/// - Rejects empty strings, non-numeric characters, or multiple `.` separators.
/// - Does **not** use floating-point at any stage.
pub fn price_to_micros(s: &str, field: &'static str) -> Result<i64, NormalizerError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(NormalizerError::EmptyPrice { field });
    }

    // Handle optional sign.
    let (negative, digits) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    if digits.is_empty() {
        return Err(NormalizerError::InvalidPrice {
            field,
            raw: s.to_string(),
        });
    }

    // Split on '.'.
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };

    // Reject anything that is not pure ASCII digits in either part.
    let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(NormalizerError::InvalidPrice {
            field,
            raw: s.to_string(),
        });
    }
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(NormalizerError::InvalidPrice {
            field,
            raw: s.to_string(),
        });
    }

    // Reject more than 6 decimal places (would require rounding).
    if frac_part.len() > 6 {
        return Err(NormalizerError::TooManyDecimalPlaces {
            field,
            raw: s.to_string(),
        });
    }

    // Parse integer part.
    let int_val: i64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse::<i64>()
            .map_err(|_| NormalizerError::InvalidPrice {
                field,
                raw: s.to_string(),
            })?
    };

    // Pad fractional part to exactly 6 digits, then parse.
    let mut frac_padded = frac_part.to_string();
    while frac_padded.len() < 6 {
        frac_padded.push('0');
    }
    let frac_val: i64 = frac_padded
        .parse::<i64>()
        .map_err(|_| NormalizerError::InvalidPrice {
            field,
            raw: s.to_string(),
        })?;

    let micros = int_val
        .checked_mul(1_000_000)
        .and_then(|v| v.checked_add(frac_val))
        .ok_or_else(|| NormalizerError::InvalidPrice {
            field,
            raw: s.to_string(),
        })?;

    Ok(if negative { -micros } else { micros })
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a single [`RawBar`] into a [`NormalizedBar`].
///
/// Returns `Err` if any price cannot be converted deterministically or if
/// OHLC sanity checks fail.
pub fn normalize(bar: &RawBar) -> Result<NormalizedBar, NormalizerError> {
    let open_micros = price_to_micros(&bar.open, "open")?;
    let high_micros = price_to_micros(&bar.high, "high")?;
    let low_micros = price_to_micros(&bar.low, "low")?;
    let close_micros = price_to_micros(&bar.close, "close")?;

    if bar.volume < 0 {
        return Err(NormalizerError::NegativeVolume(bar.volume));
    }

    validate_ohlc(open_micros, high_micros, low_micros, close_micros)?;

    Ok(NormalizedBar {
        symbol: bar.symbol.clone(),
        timeframe: bar.timeframe.clone(),
        end_ts: bar.end_ts,
        open_micros,
        high_micros,
        low_micros,
        close_micros,
        volume: bar.volume,
        is_complete: bar.is_complete,
    })
}

/// Normalize a batch of [`RawBar`]s, collecting all errors.
///
/// Returns `Ok(Vec<NormalizedBar>)` only if every bar normalizes successfully.
/// On the first error, returns `Err`.  Use this when you need an all-or-nothing
/// result; iterate and call [`normalize`] individually for partial success.
pub fn normalize_all(bars: &[RawBar]) -> Result<Vec<NormalizedBar>, NormalizerError> {
    bars.iter().map(normalize).collect()
}

/// Sort a slice of [`NormalizedBar`]s in-place by `(symbol, timeframe, end_ts)`.
///
/// This ordering is deterministic and matches the natural primary key of
/// `md_bars` in the database.
pub fn sort_normalized(bars: &mut [NormalizedBar]) {
    bars.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then_with(|| a.timeframe.cmp(&b.timeframe))
            .then_with(|| a.end_ts.cmp(&b.end_ts))
    });
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_ohlc(open: i64, high: i64, low: i64, close: i64) -> Result<(), NormalizerError> {
    if low > high {
        return Err(NormalizerError::OhlcViolation(format!(
            "low ({low}) > high ({high})"
        )));
    }
    if low > open {
        return Err(NormalizerError::OhlcViolation(format!(
            "low ({low}) > open ({open})"
        )));
    }
    if low > close {
        return Err(NormalizerError::OhlcViolation(format!(
            "low ({low}) > close ({close})"
        )));
    }
    if high < open {
        return Err(NormalizerError::OhlcViolation(format!(
            "high ({high}) < open ({open})"
        )));
    }
    if high < close {
        return Err(NormalizerError::OhlcViolation(format!(
            "high ({high}) < close ({close})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
