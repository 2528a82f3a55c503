use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ActivityEntry, Execution, ExecutionStatus};

/// A change applied to one execution document while its record lock is held.
///
/// Returning `Err` discards every change the closure made.
pub type Mutation<'a> = Box<dyn FnOnce(&mut Execution) -> Result<(), StorageError> + Send + 'a>;

/// The storage trait for vendorflow backends.
///
/// An `ExecutionStore` holds execution documents and the bounded
/// recent-activity log.
///
/// ## Update Semantics
///
/// `update_execution` is the only way to change a stored execution. The
/// backend serializes updates per execution id (a row lock, a document
/// compare-and-swap, or an in-process mutex) and applies the [`Mutation`] to a
/// working copy. The copy replaces the stored document only when the
/// mutation returns `Ok`, so concurrent writers to the same record never
/// interleave and a rejected mutation leaves no trace. Updates to different
/// executions must not block each other.
///
/// ## Activity Log
///
/// `append_activity` inserts at the front and truncates to the backend's
/// capacity as one atomic step; `recent_activity` returns newest first.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait ExecutionStore: Send + Sync + 'static {
    // ── Executions ───────────────────────────────────────────────────────────

    /// Store a new execution.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn insert_execution(&self, execution: Execution) -> Result<(), StorageError>;

    /// Read one execution.
    ///
    /// Returns `Err(StorageError::ExecutionNotFound)` if it does not exist.
    async fn get_execution(&self, execution_id: &str) -> Result<Execution, StorageError>;

    /// List executions, newest `updated_at` first, optionally filtered by status.
    ///
    /// Executions with equal `updated_at` are ordered most recently inserted first.
    async fn list_executions(
        &self,
        status_filter: Option<ExecutionStatus>,
    ) -> Result<Vec<Execution>, StorageError>;

    /// Apply `mutation` to one execution under its record lock and return the
    /// committed document.
    ///
    /// Returns `Err(StorageError::ExecutionNotFound)` if it does not exist, or
    /// whatever error the mutation returned.
    async fn update_execution(
        &self,
        execution_id: &str,
        mutation: Mutation<'_>,
    ) -> Result<Execution, StorageError>;

    /// Remove an execution and return it.
    ///
    /// Returns `Err(StorageError::ExecutionNotFound)` if it does not exist.
    async fn delete_execution(&self, execution_id: &str) -> Result<Execution, StorageError>;

    // ── Activity log ─────────────────────────────────────────────────────────

    /// Record an activity entry, evicting the oldest entries beyond capacity.
    async fn append_activity(&self, entry: ActivityEntry) -> Result<(), StorageError>;

    /// The retained activity entries, newest first.
    async fn recent_activity(&self) -> Result<Vec<ActivityEntry>, StorageError>;
}
