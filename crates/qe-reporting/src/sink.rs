//! Boundary adapter: hands a finished [`crate::EodReport`] to an external
//! sink. CSV/HTML formatting, dashboards, and persistence are the sink
//! implementation's problem, not this crate's — see [`crate::report`].

use crate::report::EodReport;

/// Implemented by whatever the caller wants to do with a finished report:
/// write it to disk, push it to a dashboard, hand it to a backtest
/// comparison. This crate only ships [`NoopReportSink`], a discard
/// implementation useful for tests and dry runs.
pub trait EodReportSink: Send + Sync {
    fn write_report(&self, report: &EodReport) -> anyhow::Result<()>;
}

/// Discards the report. Useful when a caller only wants `build_eod_report`'s
/// in-memory value (e.g. the CLI's own printer) and has no sink to wire.
#[derive(Debug, Default)]
pub struct NoopReportSink;

impl EodReportSink for NoopReportSink {
    fn write_report(&self, _report: &EodReport) -> anyhow::Result<()> {
        Ok(())
    }
}
