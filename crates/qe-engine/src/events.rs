//! Error/Event Bus composition: every [`EngineEvent`](qe_schemas::EngineEvent)
//! the engine raises goes through one `EventSink`, which is responsible for
//! (a) writing it to the durable, hash-chained audit log and (b) emitting a
//! matching `tracing` event so an operator tailing stdout sees the same
//! story the audit log will later prove.

use std::sync::Mutex;

use qe_audit::AuditWriter;
use qe_schemas::EngineEvent;
use serde_json::json;
use uuid::Uuid;

/// Sink for structured engine events. Implementations must not drop events —
/// a failed write is a process-ending error, not a log-and-continue one,
/// since a gap in the audit trail defeats the reason the trail exists.
pub trait EventSink: Send + Sync {
    fn emit(&self, run_id: Uuid, event: EngineEvent) -> anyhow::Result<()>;
}

/// Durable sink backed by [`qe_audit::AuditWriter`]. One process owns the
/// writer; `Mutex` serializes appends since `AuditWriter::append` needs
/// `&mut self` to advance its hash chain and sequence counter.
pub struct AuditEventSink {
    writer: Mutex<AuditWriter>,
}

impl AuditEventSink {
    pub fn new(writer: AuditWriter) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl EventSink for AuditEventSink {
    fn emit(&self, run_id: Uuid, event: EngineEvent) -> anyhow::Result<()> {
        let topic = event.topic();
        let event_type = event_type_name(&event);
        let payload = serde_json::to_value(&event)?;

        tracing::info!(topic, event_type, payload = %payload, "engine event");

        let mut writer = self.writer.lock().unwrap();
        writer.append(run_id, topic, event_type, payload)?;
        Ok(())
    }
}

/// Discriminant name for the event, used as the audit log's `event_type`
/// field. Kept separate from `topic()` (which groups related variants,
/// e.g. all order events could share a topic) even though today they are
/// in lockstep, one per variant.
fn event_type_name(event: &EngineEvent) -> &'static str {
    match event {
        EngineEvent::CycleStarted { .. } => "CycleStarted",
        EngineEvent::CycleCompleted { .. } => "CycleCompleted",
        EngineEvent::SignalProposed { .. } => "SignalProposed",
        EngineEvent::SignalRejected { .. } => "SignalRejected",
        EngineEvent::OrderSubmitted { .. } => "OrderSubmitted",
        EngineEvent::OrderFilled { .. } => "OrderFilled",
        EngineEvent::OrderFailed { .. } => "OrderFailed",
        EngineEvent::StopTriggered { .. } => "StopTriggered",
        EngineEvent::PhantomDetected { .. } => "PhantomDetected",
        EngineEvent::OrphanRecovered { .. } => "OrphanRecovered",
        EngineEvent::RiskLimitViolation { .. } => "RiskLimitViolation",
        EngineEvent::DailyLossBreach { .. } => "DailyLossBreach",
        EngineEvent::SessionStarted { .. } => "SessionStarted",
        EngineEvent::SessionEnded { .. } => "SessionEnded",
        EngineEvent::PositionClosed { .. } => "PositionClosed",
    }
}

/// No-op sink for tests and dry runs that don't need a durable trail —
/// events are still traced, just not persisted.
#[derive(Default)]
pub struct TracingOnlySink;

impl EventSink for TracingOnlySink {
    fn emit(&self, _run_id: Uuid, event: EngineEvent) -> anyhow::Result<()> {
        tracing::info!(topic = event.topic(), event_type = event_type_name(&event), "engine event");
        let _ = json!({});
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qe_schemas::Symbol;

    #[test]
    fn audit_sink_persists_every_emitted_event() {
        let dir = tempfile::tempdir().unwrap();
        let writer = AuditWriter::new(dir.path().join("audit.jsonl"), true).unwrap();
        let sink = AuditEventSink::new(writer);
        let run_id = Uuid::new_v4();

        sink.emit(
            run_id,
            EngineEvent::CycleStarted {
                symbol: Symbol::new("AAPL"),
                cycle_id: 1,
            },
        )
        .unwrap();
        sink.emit(
            run_id,
            EngineEvent::CycleCompleted {
                symbol: Symbol::new("AAPL"),
                cycle_id: 1,
            },
        )
        .unwrap();

        let result = qe_audit::verify_hash_chain(dir.path().join("audit.jsonl")).unwrap();
        assert_eq!(result, qe_audit::VerifyResult::Valid { lines: 2 });
    }

    #[test]
    fn tracing_only_sink_never_errors() {
        let sink = TracingOnlySink;
        let result = sink.emit(
            Uuid::new_v4(),
            EngineEvent::SessionEnded {
                session_date: "2026-07-27".to_string(),
                trade_count: 0,
            },
        );
        assert!(result.is_ok());
    }
}
