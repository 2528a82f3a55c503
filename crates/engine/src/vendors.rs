//! Vendor status updates.
//!
//! Vendors are addressed by their position in the execution's vendor list.
//! A vendor moving to `responded` or `conversation` bumps the matching
//! counter, and may advance the execution one step:
//!
//! - `responded` while the execution is `email_sent` moves it to `vendor_responded`
//! - `conversation` while it is `vendor_responded` moves it to `agent_conversation`
//!
//! Each transition fires at most once because it requires the exact prior
//! status.

use serde::Deserialize;
use time::OffsetDateTime;
use vendorflow_storage::{ActivityKind, Execution, ExecutionStatus, StorageError, VendorStatus};

use crate::executions::ExecutionManager;
use crate::EngineError;

#[derive(Debug, Clone, Deserialize)]
pub struct VendorStatusUpdate {
    pub status: VendorStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Apply `update` to the vendor at `index`. Returns the activity to record
/// when the execution's status advanced.
pub fn apply_vendor_status(
    execution: &mut Execution,
    index: usize,
    update: &VendorStatusUpdate,
    now: OffsetDateTime,
) -> Result<Option<ActivityKind>, StorageError> {
    let execution_id = execution.id.clone();
    let vendor = execution
        .vendors
        .get_mut(index)
        .ok_or(StorageError::VendorNotFound {
            execution_id,
            index,
        })?;

    vendor.status = update.status;
    if let Some(notes) = update.notes.as_deref().filter(|n| !n.is_empty()) {
        vendor.notes = notes.to_string();
    }

    let mut advanced = None;
    match update.status {
        VendorStatus::Responded => {
            vendor.response_date = Some(now);
            execution.vendors_responded += 1;
            if execution.status == ExecutionStatus::EmailSent {
                execution.status = ExecutionStatus::VendorResponded;
                advanced = Some(ActivityKind::VendorResponse);
            }
        }
        VendorStatus::Conversation => {
            execution.active_conversations += 1;
            if execution.status == ExecutionStatus::VendorResponded {
                execution.status = ExecutionStatus::AgentConversation;
                advanced = Some(ActivityKind::ConversationStarted);
            }
        }
        _ => {}
    }
    execution.updated_at = now;
    Ok(advanced)
}

impl ExecutionManager {
    /// Set the status of vendor `vendor_index` (a decimal position).
    pub async fn update_vendor_status(
        &self,
        execution_id: &str,
        vendor_index: &str,
        update: VendorStatusUpdate,
    ) -> Result<Execution, EngineError> {
        let index = vendor_index
            .trim()
            .parse::<usize>()
            .map_err(|_| EngineError::VendorNotFound {
                execution_id: execution_id.to_string(),
                index: vendor_index.to_string(),
            })?;

        let status = update.status;
        let now = OffsetDateTime::now_utc();
        let mut advanced = None;
        let advanced_slot = &mut advanced;
        let result = self
            .store
            .update_execution(
                execution_id,
                Box::new(move |e: &mut Execution| -> Result<(), StorageError> {
                    *advanced_slot = apply_vendor_status(e, index, &update, now)?;
                    Ok(())
                }),
            )
            .await;
        let execution = result?;

        tracing::info!(
            execution_id,
            vendor = index,
            status = ?status,
            "vendor status updated"
        );
        if let Some(kind) = advanced {
            tracing::info!(execution_id, status = %execution.status, "execution advanced");
            self.activity.record(&execution, kind).await?;
        }
        Ok(execution)
    }
}
