//! EOD Reporter (C12).
//!
//! A pure function over the session's `CompletedTrade` log
//! (`&[CompletedTrade] -> EodReport`) plus a thin boundary adapter that
//! hands the resulting rows to an external sink. CSV/HTML/dashboard
//! formatting is out of scope here — see `sink`.

pub mod report;
pub mod sink;

pub use report::{build_eod_report, EodReport, HourBucketReport, SymbolReport};
pub use sink::{EodReportSink, NoopReportSink};
