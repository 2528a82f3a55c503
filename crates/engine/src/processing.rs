//! Background processing runs.
//!
//! A run walks the execution's materials in order, surveys vendors for each
//! one through the [`OutreachSimulator`], and pauses `step_delay` between
//! materials. Progress is written to the stored `processingStatus` so
//! clients can poll it. When every material has been surveyed the execution
//! moves to `email_sent` with a vendor shortlist attached.
//!
//! Cancellation is advisory. Cancel flips the stored flags and the run's
//! token; the loop notices before its next step, and every loop write is
//! refused once the record has left the processing state.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use vendorflow_storage::{
    ActivityKind, Execution, ExecutionStatus, ExecutionStore, MaterialResult, ProcessingStatus,
    StorageError,
};

use crate::activity::ActivityRecorder;
use crate::outreach::OutreachSimulator;
use crate::runs::{RunRegistry, RunToken};
use crate::EngineError;

/// Timing and sizing knobs for processing runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause after each material.
    pub step_delay: Duration,
    /// Pause before a research request returns.
    pub research_delay: Duration,
    /// Vendors attached when a run completes or research is triggered.
    pub shortlist_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(2000),
            research_delay: Duration::from_millis(1500),
            shortlist_size: 5,
        }
    }
}

/// What a status poll returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSnapshot {
    pub processing_status: ProcessingStatus,
    pub status: ExecutionStatus,
}

enum RunOutcome {
    Completed,
    Halted,
}

fn still_processing(e: &Execution) -> bool {
    e.processing_status.is_processing && e.status == ExecutionStatus::Processing
}

#[derive(Clone)]
pub struct ProcessingEngine {
    store: Arc<dyn ExecutionStore>,
    activity: ActivityRecorder,
    simulator: Arc<dyn OutreachSimulator>,
    runs: Arc<RunRegistry>,
    config: EngineConfig,
}

impl ProcessingEngine {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        activity: ActivityRecorder,
        simulator: Arc<dyn OutreachSimulator>,
        runs: Arc<RunRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            activity,
            simulator,
            runs,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn runs(&self) -> &Arc<RunRegistry> {
        &self.runs
    }

    /// Move the execution to `processing` and launch its run in the
    /// background. Returns as soon as the run is registered.
    pub async fn start(&self, execution_id: &str) -> Result<Execution, EngineError> {
        let now = OffsetDateTime::now_utc();
        let execution = self
            .store
            .update_execution(
                execution_id,
                Box::new(move |e: &mut Execution| -> Result<(), StorageError> {
                    if e.processing_status.is_processing {
                        return Err(StorageError::Rejected {
                            execution_id: e.id.clone(),
                            reason: "execution is already processing".to_string(),
                        });
                    }
                    e.status = ExecutionStatus::Processing;
                    e.processing_status = ProcessingStatus::started(e.materials.len());
                    e.updated_at = now;
                    Ok(())
                }),
            )
            .await?;

        let engine = self.clone();
        let id = execution.id.clone();
        let run_id = self
            .runs
            .launch(&execution.id, move |token| engine.run(id, token))
            .await;
        tracing::info!(
            execution_id = %execution.id,
            run_id,
            materials = execution.materials.len(),
            "processing started"
        );
        Ok(execution)
    }

    pub async fn status(&self, execution_id: &str) -> Result<ProcessingSnapshot, EngineError> {
        let execution = self.store.get_execution(execution_id).await?;
        Ok(ProcessingSnapshot {
            processing_status: execution.processing_status,
            status: execution.status,
        })
    }

    /// Revert a processing execution to `draft` and flag its run.
    ///
    /// `processedCount` keeps its last value. An execution that is not
    /// processing is returned unchanged.
    pub async fn cancel(&self, execution_id: &str) -> Result<Execution, EngineError> {
        let now = OffsetDateTime::now_utc();
        // Read before the commit: a start that lands after it owns a new run.
        let run = self.runs.current(execution_id).await;
        let execution = self
            .store
            .update_execution(
                execution_id,
                Box::new(move |e: &mut Execution| -> Result<(), StorageError> {
                    if e.processing_status.is_processing || e.status == ExecutionStatus::Processing {
                        e.status = ExecutionStatus::Draft;
                        e.processing_status.is_processing = false;
                        e.updated_at = now;
                    }
                    Ok(())
                }),
            )
            .await?;
        if let Some(run_id) = run {
            if self.runs.cancel_run(execution_id, run_id).await {
                tracing::info!(
                    execution_id,
                    run_id,
                    processed = execution.processing_status.processed_count,
                    "processing cancelled"
                );
            }
        }
        Ok(execution)
    }

    /// Attach a fresh vendor shortlist and mark the execution `email_sent`
    /// without running the per-material loop. Any active run is halted.
    /// Responds after `research_delay`.
    pub async fn research(&self, execution_id: &str) -> Result<Execution, EngineError> {
        let now = OffsetDateTime::now_utc();
        let simulator = Arc::clone(&self.simulator);
        let count = self.config.shortlist_size;
        let run = self.runs.current(execution_id).await;
        let execution = self
            .store
            .update_execution(
                execution_id,
                Box::new(move |e: &mut Execution| -> Result<(), StorageError> {
                    let vendors = simulator.shortlist(e, count);
                    e.vendors_contacted = vendors.len() as u32;
                    e.vendors = vendors;
                    e.status = ExecutionStatus::EmailSent;
                    e.processing_status.is_processing = false;
                    e.updated_at = now;
                    Ok(())
                }),
            )
            .await?;
        if let Some(run_id) = run {
            self.runs.cancel_run(execution_id, run_id).await;
        }
        self.activity
            .record(&execution, ActivityKind::EmailSent)
            .await?;
        tracing::info!(
            execution_id,
            vendors = execution.vendors.len(),
            "research triggered"
        );

        tokio::time::sleep(self.config.research_delay).await;
        Ok(execution)
    }

    async fn run(self, execution_id: String, token: RunToken) {
        match self.drive(&execution_id, &token).await {
            Ok(RunOutcome::Completed) => {
                tracing::info!(execution_id = %execution_id, run_id = token.run_id(), "processing completed");
            }
            Ok(RunOutcome::Halted) => {
                tracing::info!(execution_id = %execution_id, run_id = token.run_id(), "processing halted");
            }
            Err(EngineError::ExecutionNotFound { .. }) => {
                tracing::info!(execution_id = %execution_id, "execution removed during processing");
            }
            Err(err) => {
                tracing::warn!(execution_id = %execution_id, error = %err, "processing failed, reverting to draft");
                self.revert(&execution_id).await;
            }
        }
        self.runs.finish(&execution_id, token.run_id()).await;
    }

    async fn drive(&self, execution_id: &str, token: &RunToken) -> Result<RunOutcome, EngineError> {
        let execution = self.store.get_execution(execution_id).await?;
        let total = execution.materials.len();

        for (i, material) in execution.materials.iter().enumerate() {
            if token.is_cancelled() {
                return Ok(RunOutcome::Halted);
            }

            let name = material.name.clone();
            let progressed = self
                .apply(execution_id, move |e| {
                    e.processing_status.current_material = name;
                    e.processing_status.processed_count = i;
                })
                .await?;
            if !progressed {
                return Ok(RunOutcome::Halted);
            }
            tracing::debug!(execution_id, material = %material.name, step = i + 1, total, "surveying vendors");

            let result = match self.simulator.survey(material, &execution.guardrails) {
                Ok(quote) => MaterialResult::quoted(
                    &material.name,
                    quote.vendor_count,
                    quote.best_price,
                    quote.fastest_delivery,
                ),
                Err(err) => {
                    tracing::warn!(execution_id, material = %material.name, error = %err, "survey failed");
                    MaterialResult::failed(&material.name, err.to_string())
                }
            };
            if !self
                .apply(execution_id, move |e| e.processing_status.results.push(result))
                .await?
            {
                return Ok(RunOutcome::Halted);
            }

            tokio::time::sleep(self.config.step_delay).await;
            if token.is_cancelled() {
                return Ok(RunOutcome::Halted);
            }
        }

        let simulator = Arc::clone(&self.simulator);
        let count = self.config.shortlist_size;
        let completed = self
            .apply(execution_id, move |e| {
                let vendors = simulator.shortlist(e, count);
                e.vendors_contacted = vendors.len() as u32;
                e.vendors = vendors;
                e.status = ExecutionStatus::EmailSent;
                e.processing_status.is_processing = false;
                e.processing_status.processed_count = e.processing_status.total_count;
            })
            .await?;
        if !completed {
            return Ok(RunOutcome::Halted);
        }

        let execution = self.store.get_execution(execution_id).await?;
        self.activity
            .record(&execution, ActivityKind::EmailSent)
            .await?;
        Ok(RunOutcome::Completed)
    }

    /// Apply `f` only while the execution is still processing. Returns
    /// `Ok(false)` when the run has been cancelled or superseded.
    async fn apply<F>(&self, execution_id: &str, f: F) -> Result<bool, EngineError>
    where
        F: FnOnce(&mut Execution) + Send + 'static,
    {
        let now = OffsetDateTime::now_utc();
        let mut halted = false;
        let halted_flag = &mut halted;
        let result = self
            .store
            .update_execution(
                execution_id,
                Box::new(move |e: &mut Execution| -> Result<(), StorageError> {
                    if !still_processing(e) {
                        *halted_flag = true;
                        return Err(StorageError::Rejected {
                            execution_id: e.id.clone(),
                            reason: "execution is no longer processing".to_string(),
                        });
                    }
                    f(e);
                    e.updated_at = now;
                    Ok(())
                }),
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(_) if halted => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Loop-level failure: put the execution back to `draft`.
    async fn revert(&self, execution_id: &str) {
        let now = OffsetDateTime::now_utc();
        let reverted = self
            .store
            .update_execution(
                execution_id,
                Box::new(move |e: &mut Execution| -> Result<(), StorageError> {
                    if still_processing(e) {
                        e.status = ExecutionStatus::Draft;
                        e.processing_status.is_processing = false;
                        e.updated_at = now;
                    }
                    Ok(())
                }),
            )
            .await;
        if let Err(err) = reverted {
            tracing::error!(execution_id, error = %err, "failed to revert execution");
        }
    }
}
