//! Audit recorder - structured security-event emission.
//!
//! Writes are best-effort by design: a slow or failing sink must never
//! convert a successful auth outcome into a failure, so append errors are
//! logged locally and swallowed.

use std::sync::Arc;

use crate::models::AuditEvent;
use crate::store::AuditSink;

#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Append an event, waiting for the sink's bounded attempt. The result
    /// is never surfaced to the caller.
    pub async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.sink.append(&event).await {
            tracing::error!(
                error = %e,
                action = %event.action,
                "Failed to write audit event"
            );
        } else {
            tracing::debug!(
                action = %event.action,
                severity = %event.severity.as_str(),
                "Audit event recorded"
            );
        }
    }

    /// Fire-and-forget variant for call sites that must not wait on the
    /// sink at all.
    pub fn record_detached(&self, event: AuditEvent) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.append(&event).await {
                tracing::error!(
                    error = %e,
                    action = %event.action,
                    "Failed to write audit event"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::models::{AuditCategory, AuditSeverity};
    use crate::store::MemoryAuditSink;
    use async_trait::async_trait;

    struct FailingSink;

    #[async_trait]
    impl AuditSink for FailingSink {
        async fn append(&self, _event: &AuditEvent) -> Result<(), AuthError> {
            Err(AuthError::Store(anyhow::anyhow!("sink unavailable")))
        }
    }

    fn event() -> AuditEvent {
        AuditEvent::new(
            "login_failed",
            AuditCategory::Security,
            AuditSeverity::Medium,
            "test",
            "203.0.113.9",
            None,
        )
    }

    #[tokio::test]
    async fn record_appends_to_sink() {
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = AuditRecorder::new(sink.clone());

        recorder.record(event()).await;
        assert_eq!(sink.count_action("login_failed"), 1);
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let recorder = AuditRecorder::new(Arc::new(FailingSink));
        // Must not panic or propagate.
        recorder.record(event()).await;
    }

    #[tokio::test]
    async fn detached_write_lands_without_blocking_the_caller() {
        let sink = Arc::new(MemoryAuditSink::new());
        let recorder = AuditRecorder::new(sink.clone());

        recorder.record_detached(event());

        for _ in 0..50 {
            if sink.count_action("login_failed") == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("detached audit write never landed");
    }
}
