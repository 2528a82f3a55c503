//! Execution CRUD.

use std::sync::Arc;

use serde::Deserialize;
use time::OffsetDateTime;
use vendorflow_storage::{
    ActivityKind, Execution, ExecutionStatus, ExecutionStore, Guardrails, Material, StorageError,
};

use crate::activity::ActivityRecorder;
use crate::runs::RunRegistry;
use crate::EngineError;

/// Body of a create request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExecution {
    #[serde(default)]
    pub name: String,
    pub materials: Vec<Material>,
    #[serde(default)]
    pub guardrails: Option<Guardrails>,
}

/// Fields a client may change. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub materials: Option<Vec<Material>>,
    #[serde(default)]
    pub guardrails: Option<Guardrails>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
}

/// Parse a status path segment such as `email_sent`.
pub fn parse_status(raw: &str) -> Result<ExecutionStatus, EngineError> {
    raw.parse::<ExecutionStatus>().map_err(EngineError::Validation)
}

fn validate_materials(materials: &[Material]) -> Result<(), EngineError> {
    for (i, m) in materials.iter().enumerate() {
        for (field, value) in [("quantity", m.quantity), ("rate", m.rate)] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Validation(format!(
                    "materials[{i}].{field} must be a non-negative number, got {value}"
                )));
            }
        }
    }
    Ok(())
}

fn derive_totals(mut materials: Vec<Material>) -> Vec<Material> {
    materials.iter_mut().for_each(Material::recompute_total);
    materials
}

#[derive(Clone)]
pub struct ExecutionManager {
    pub(crate) store: Arc<dyn ExecutionStore>,
    pub(crate) activity: ActivityRecorder,
    pub(crate) runs: Arc<RunRegistry>,
}

impl ExecutionManager {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        activity: ActivityRecorder,
        runs: Arc<RunRegistry>,
    ) -> Self {
        Self {
            store,
            activity,
            runs,
        }
    }

    /// Create a `draft` execution and record a `created` activity entry.
    pub async fn create(&self, new: NewExecution) -> Result<Execution, EngineError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("name is required".to_string()));
        }
        validate_materials(&new.materials)?;

        let execution = Execution::draft(
            uuid::Uuid::new_v4().to_string(),
            name,
            new.materials,
            new.guardrails.unwrap_or_default(),
            OffsetDateTime::now_utc(),
        );
        self.store.insert_execution(execution.clone()).await?;
        self.activity
            .record(&execution, ActivityKind::Created)
            .await?;
        tracing::info!(
            execution_id = %execution.id,
            name = %execution.name,
            materials = execution.materials.len(),
            total_cost = execution.total_cost(),
            "execution created"
        );
        Ok(execution)
    }

    pub async fn get(&self, execution_id: &str) -> Result<Execution, EngineError> {
        Ok(self.store.get_execution(execution_id).await?)
    }

    /// Newest first, optionally restricted to one status.
    pub async fn list(&self, status: Option<ExecutionStatus>) -> Result<Vec<Execution>, EngineError> {
        Ok(self.store.list_executions(status).await?)
    }

    /// Merge `patch` into the execution and record an `updated` entry.
    ///
    /// A blank name counts as absent. Replacing materials re-derives their
    /// totals; `totalCount` follows them unless a run is active. Moving a
    /// processing execution to another status ends the run the same way a
    /// cancel does. `processing` itself can only be entered by starting a run.
    pub async fn update(
        &self,
        execution_id: &str,
        patch: ExecutionPatch,
    ) -> Result<Execution, EngineError> {
        if let Some(materials) = &patch.materials {
            validate_materials(materials)?;
        }
        let now = OffsetDateTime::now_utc();
        let run = self.runs.current(execution_id).await;
        let mut left_processing = false;
        let left_processing_flag = &mut left_processing;

        let result = self
            .store
            .update_execution(
                execution_id,
                Box::new(move |e: &mut Execution| -> Result<(), StorageError> {
                    if let Some(name) = patch.name.as_deref().map(str::trim) {
                        if !name.is_empty() {
                            e.name = name.to_string();
                        }
                    }
                    if let Some(materials) = patch.materials {
                        e.materials = derive_totals(materials);
                        if !e.processing_status.is_processing {
                            e.processing_status.total_count = e.materials.len();
                        }
                    }
                    if let Some(guardrails) = patch.guardrails {
                        e.guardrails = guardrails;
                    }
                    if let Some(status) = patch.status {
                        let processing = e.status == ExecutionStatus::Processing;
                        if status == ExecutionStatus::Processing && !processing {
                            return Err(StorageError::Rejected {
                                execution_id: e.id.clone(),
                                reason: "status 'processing' is entered by starting a processing run"
                                    .to_string(),
                            });
                        }
                        if processing && status != ExecutionStatus::Processing {
                            e.processing_status.is_processing = false;
                            *left_processing_flag = true;
                        }
                        e.status = status;
                    }
                    e.updated_at = now;
                    Ok(())
                }),
            )
            .await;
        let execution = result?;

        if left_processing {
            if let Some(run_id) = run {
                self.runs.cancel_run(execution_id, run_id).await;
            }
            tracing::info!(execution_id, status = %execution.status, "processing ended by update");
        }
        self.activity
            .record(&execution, ActivityKind::Updated)
            .await?;
        tracing::info!(execution_id, "execution updated");
        Ok(execution)
    }

    /// Remove the execution and cancel any run registered for it.
    pub async fn delete(&self, execution_id: &str) -> Result<Execution, EngineError> {
        let removed = self.store.delete_execution(execution_id).await?;
        if self.runs.cancel(execution_id).await {
            tracing::debug!(execution_id, "cancelled run of deleted execution");
        }
        tracing::info!(execution_id, name = %removed.name, "execution deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendorflow_storage::InMemoryStore;

    fn manager() -> (ExecutionManager, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let manager = ExecutionManager::new(
            store.clone(),
            ActivityRecorder::new(store.clone()),
            Arc::new(RunRegistry::new()),
        );
        (manager, store)
    }

    fn sugar() -> NewExecution {
        serde_json::from_value(serde_json::json!({
            "name": "Test",
            "materials": [{"name": "Sugar", "quantity": 10, "rate": 50}],
            "guardrails": {}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_derives_totals_and_starts_in_draft() {
        let (manager, store) = manager();
        let e = manager.create(sugar()).await.unwrap();
        assert_eq!(e.status, ExecutionStatus::Draft);
        assert_eq!(e.materials[0].total_cost, 500.0);
        assert_eq!(e.processing_status.total_count, 1);
        assert_eq!(e.processing_status.processed_count, 0);
        assert!(!e.processing_status.is_processing);
        assert_eq!(
            (e.vendors_contacted, e.vendors_responded, e.active_conversations),
            (0, 0, 0)
        );
        assert!(uuid::Uuid::parse_str(&e.id).is_ok());

        let activity = store.recent_activity().await.unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].activity_type, ActivityKind::Created);
        assert_eq!(activity[0].execution_name, "Test");
    }

    #[tokio::test]
    async fn create_ignores_client_total_cost() {
        let (manager, _) = manager();
        let new: NewExecution = serde_json::from_value(serde_json::json!({
            "name": "Salt run",
            "materials": [{"id": 7, "name": "Salt", "quantity": 20, "rate": 15, "totalCost": 1}]
        }))
        .unwrap();
        let e = manager.create(new).await.unwrap();
        assert_eq!(e.materials[0].total_cost, 300.0);
        assert_eq!(e.guardrails, Guardrails::default());
    }

    #[tokio::test]
    async fn create_rejects_blank_name_and_negative_numbers() {
        let (manager, _) = manager();
        let mut new = sugar();
        new.name = "   ".into();
        assert!(matches!(
            manager.create(new).await,
            Err(EngineError::Validation(_))
        ));

        let mut new = sugar();
        new.materials[0].rate = -1.0;
        assert!(matches!(
            manager.create(new).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn update_merges_only_supplied_fields() {
        let (manager, store) = manager();
        let created = manager.create(sugar()).await.unwrap();

        let patch: ExecutionPatch = serde_json::from_value(serde_json::json!({
            "name": "",
            "materials": [
                {"name": "Sugar", "quantity": 4, "rate": 50},
                {"name": "Salt", "quantity": 3, "rate": 10}
            ]
        }))
        .unwrap();
        let updated = manager.update(&created.id, patch).await.unwrap();
        assert_eq!(updated.name, "Test");
        assert_eq!(updated.materials[0].total_cost, 200.0);
        assert_eq!(updated.materials[1].total_cost, 30.0);
        assert_eq!(updated.processing_status.total_count, 2);
        assert_eq!(updated.guardrails, created.guardrails);
        assert_eq!(updated.status, ExecutionStatus::Draft);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);

        let activity = store.recent_activity().await.unwrap();
        assert_eq!(activity[0].activity_type, ActivityKind::Updated);
        assert_eq!(activity[0].details, "Execution updated");
    }

    #[tokio::test]
    async fn update_can_set_status_but_not_enter_processing() {
        let (manager, _) = manager();
        let created = manager.create(sugar()).await.unwrap();

        let patch = ExecutionPatch {
            status: Some(ExecutionStatus::Completed),
            ..Default::default()
        };
        let updated = manager.update(&created.id, patch).await.unwrap();
        assert_eq!(updated.status, ExecutionStatus::Completed);

        let patch = ExecutionPatch {
            status: Some(ExecutionStatus::Processing),
            ..Default::default()
        };
        assert!(matches!(
            manager.update(&created.id, patch).await,
            Err(EngineError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn missing_execution_is_not_found() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.get("nope").await,
            Err(EngineError::ExecutionNotFound { .. })
        ));
        assert!(matches!(
            manager.update("nope", ExecutionPatch::default()).await,
            Err(EngineError::ExecutionNotFound { .. })
        ));
        assert!(matches!(
            manager.delete("nope").await,
            Err(EngineError::ExecutionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_without_activity() {
        let (manager, store) = manager();
        let created = manager.create(sugar()).await.unwrap();
        manager.delete(&created.id).await.unwrap();
        assert!(manager.list(None).await.unwrap().is_empty());
        assert_eq!(store.recent_activity().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let (manager, _) = manager();
        let a = manager.create(sugar()).await.unwrap();
        let b = manager.create(sugar()).await.unwrap();
        manager
            .update(
                &a.id,
                ExecutionPatch {
                    status: Some(ExecutionStatus::EmailSent),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let drafts = manager.list(Some(ExecutionStatus::Draft)).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, b.id);

        let all = manager.list(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a.id, "most recently updated first");
    }

    #[test]
    fn status_segments_parse() {
        assert_eq!(parse_status("email_sent").unwrap(), ExecutionStatus::EmailSent);
        assert!(matches!(
            parse_status("sent"),
            Err(EngineError::Validation(_))
        ));
    }
}
