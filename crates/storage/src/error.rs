/// All errors that can be returned by an ExecutionStore implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// No execution with the given id.
    #[error("execution not found: {execution_id}")]
    ExecutionNotFound { execution_id: String },

    /// The execution exists but has no vendor at the given position.
    #[error("vendor not found: {execution_id}/vendors[{index}]")]
    VendorNotFound { execution_id: String, index: usize },

    /// An execution with this id is already stored.
    #[error("execution already exists: {execution_id}")]
    AlreadyExists { execution_id: String },

    /// A mutation refused to apply; the stored document is unchanged.
    #[error("update rejected for execution {execution_id}: {reason}")]
    Rejected {
        execution_id: String,
        reason: String,
    },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
