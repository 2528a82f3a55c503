//! In-process `ExecutionStore` backend.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};

use crate::error::StorageError;
use crate::record::{ActivityEntry, Execution, ExecutionStatus};
use crate::traits::{ExecutionStore, Mutation};

/// Number of activity entries retained by default.
pub const ACTIVITY_LOG_CAPACITY: usize = 20;

type Record = Arc<Mutex<Execution>>;

/// Executions kept in insertion order, each behind its own lock.
///
/// The outer `RwLock` is held only long enough to find or insert a record,
/// so updates to different executions proceed independently.
#[derive(Debug)]
pub struct InMemoryStore {
    executions: RwLock<IndexMap<String, Record>>,
    activity: Mutex<VecDeque<ActivityEntry>>,
    activity_capacity: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_activity_capacity(ACTIVITY_LOG_CAPACITY)
    }

    pub fn with_activity_capacity(activity_capacity: usize) -> Self {
        Self {
            executions: RwLock::new(IndexMap::new()),
            activity: Mutex::new(VecDeque::with_capacity(activity_capacity + 1)),
            activity_capacity,
        }
    }

    async fn record(&self, execution_id: &str) -> Result<Record, StorageError> {
        self.executions
            .read()
            .await
            .get(execution_id)
            .cloned()
            .ok_or_else(|| not_found(execution_id))
    }

    /// Whether `record` is still the stored document for `execution_id`.
    async fn is_current(&self, execution_id: &str, record: &Record) -> bool {
        self.executions
            .read()
            .await
            .get(execution_id)
            .is_some_and(|stored| Arc::ptr_eq(stored, record))
    }
}

fn not_found(execution_id: &str) -> StorageError {
    StorageError::ExecutionNotFound {
        execution_id: execution_id.to_string(),
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn insert_execution(&self, execution: Execution) -> Result<(), StorageError> {
        let mut executions = self.executions.write().await;
        if executions.contains_key(&execution.id) {
            return Err(StorageError::AlreadyExists {
                execution_id: execution.id,
            });
        }
        executions.insert(execution.id.clone(), Arc::new(Mutex::new(execution)));
        Ok(())
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Execution, StorageError> {
        let record = self.record(execution_id).await?;
        let doc = record.lock().await;
        Ok(doc.clone())
    }

    async fn list_executions(
        &self,
        status_filter: Option<ExecutionStatus>,
    ) -> Result<Vec<Execution>, StorageError> {
        // Newest insertion first, so the stable sort below breaks ties that way.
        let records: Vec<Record> = self
            .executions
            .read()
            .await
            .values()
            .rev()
            .cloned()
            .collect();

        let mut out = Vec::with_capacity(records.len());
        for record in records {
            let doc = record.lock().await;
            if status_filter.map_or(true, |s| doc.status == s) {
                out.push(doc.clone());
            }
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn update_execution(
        &self,
        execution_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<Execution, StorageError> {
        let record = self.record(execution_id).await?;
        let mut doc = record.lock().await;
        // A delete may have raced us between the lookup and the lock.
        if !self.is_current(execution_id, &record).await {
            return Err(not_found(execution_id));
        }

        let mut working = doc.clone();
        mutation(&mut working)?;
        *doc = working.clone();
        Ok(working)
    }

    async fn delete_execution(&self, execution_id: &str) -> Result<Execution, StorageError> {
        let record = self
            .executions
            .write()
            .await
            .shift_remove(execution_id)
            .ok_or_else(|| not_found(execution_id))?;
        let doc = record.lock().await;
        Ok(doc.clone())
    }

    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StorageError> {
        let mut activity = self.activity.lock().await;
        activity.push_front(entry);
        activity.truncate(self.activity_capacity);
        Ok(())
    }

    async fn recent_activity(&self) -> Result<Vec<ActivityEntry>, StorageError> {
        Ok(self.activity.lock().await.iter().cloned().collect())
    }
}
