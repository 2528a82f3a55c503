//! Recent-activity feed: one line per material state change of an execution.

use std::sync::Arc;

use time::OffsetDateTime;
use vendorflow_storage::{ActivityEntry, ActivityKind, Execution, ExecutionStore};

use crate::EngineError;

/// Appends activity entries to the store's bounded log.
#[derive(Clone)]
pub struct ActivityRecorder {
    store: Arc<dyn ExecutionStore>,
}

impl ActivityRecorder {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self { store }
    }

    /// Record `kind` for `execution` and return the stored entry.
    pub async fn record(
        &self,
        execution: &Execution,
        kind: ActivityKind,
    ) -> Result<ActivityEntry, EngineError> {
        let entry = ActivityEntry {
            id: uuid::Uuid::new_v4().to_string(),
            execution_name: execution.name.clone(),
            activity_type: kind,
            details: describe(execution, kind),
            timestamp: OffsetDateTime::now_utc(),
        };
        self.store.append_activity(entry.clone()).await?;
        tracing::debug!(
            execution_id = %execution.id,
            activity = ?kind,
            details = %entry.details,
            "activity recorded"
        );
        Ok(entry)
    }

    /// Retained entries, newest first.
    pub async fn recent(&self) -> Result<Vec<ActivityEntry>, EngineError> {
        Ok(self.store.recent_activity().await?)
    }
}

fn describe(execution: &Execution, kind: ActivityKind) -> String {
    match kind {
        ActivityKind::Created => "Execution created".to_string(),
        ActivityKind::Updated => "Execution updated".to_string(),
        ActivityKind::EmailSent => format!("{} vendors contacted", execution.vendors_contacted),
        ActivityKind::VendorResponse => {
            format!("{} vendors responded", execution.vendors_responded)
        }
        ActivityKind::ConversationStarted => {
            format!("{} active conversations", execution.active_conversations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendorflow_storage::{Guardrails, InMemoryStore, ACTIVITY_LOG_CAPACITY};

    fn execution() -> Execution {
        let mut e = Execution::draft(
            "e1",
            "Spices",
            vec![],
            Guardrails::default(),
            OffsetDateTime::UNIX_EPOCH,
        );
        e.vendors_contacted = 5;
        e.vendors_responded = 2;
        e.active_conversations = 1;
        e
    }

    #[test]
    fn details_reflect_counters() {
        let e = execution();
        assert_eq!(describe(&e, ActivityKind::Created), "Execution created");
        assert_eq!(describe(&e, ActivityKind::Updated), "Execution updated");
        assert_eq!(describe(&e, ActivityKind::EmailSent), "5 vendors contacted");
        assert_eq!(
            describe(&e, ActivityKind::VendorResponse),
            "2 vendors responded"
        );
        assert_eq!(
            describe(&e, ActivityKind::ConversationStarted),
            "1 active conversations"
        );
    }

    #[tokio::test]
    async fn log_never_exceeds_capacity() {
        let recorder = ActivityRecorder::new(Arc::new(InMemoryStore::new()));
        let e = execution();
        for _ in 0..ACTIVITY_LOG_CAPACITY + 7 {
            recorder.record(&e, ActivityKind::Updated).await.unwrap();
        }
        let last = recorder.record(&e, ActivityKind::EmailSent).await.unwrap();

        let recent = recorder.recent().await.unwrap();
        assert_eq!(recent.len(), ACTIVITY_LOG_CAPACITY);
        assert_eq!(recent[0].id, last.id);
        assert_eq!(recent[0].execution_name, "Spices");
    }
}
