use vendorflow_storage::StorageError;

use crate::importer::ImportError;

/// Broad class of an [`EngineError`], used by callers to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Internal,
}

/// Errors returned by the execution manager and processing engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("execution not found: {execution_id}")]
    ExecutionNotFound { execution_id: String },

    #[error("vendor not found: {execution_id}/vendors[{index}]")]
    VendorNotFound { execution_id: String, index: String },

    /// Bad or missing input.
    #[error("{0}")]
    Validation(String),

    /// The execution is in a state that does not allow the request.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ExecutionNotFound { .. } | EngineError::VendorNotFound { .. } => {
                ErrorKind::NotFound
            }
            EngineError::Validation(_) | EngineError::Import(_) => ErrorKind::Validation,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Short human summary, suitable for an API envelope's `message` field.
    pub fn summary(&self) -> &'static str {
        match self {
            EngineError::ExecutionNotFound { .. } => "Execution not found",
            EngineError::VendorNotFound { .. } => "Vendor not found",
            EngineError::Validation(_) => "Invalid request",
            EngineError::Conflict(_) => "Request conflicts with execution state",
            EngineError::Import(ImportError::NotCsv { .. }) => "Please upload a CSV file.",
            EngineError::Import(_) => "Error parsing CSV file",
            EngineError::Storage(_) => "Internal storage error",
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ExecutionNotFound { execution_id } => {
                EngineError::ExecutionNotFound { execution_id }
            }
            StorageError::VendorNotFound {
                execution_id,
                index,
            } => EngineError::VendorNotFound {
                execution_id,
                index: index.to_string(),
            },
            StorageError::Rejected { reason, .. } => EngineError::Conflict(reason),
            other => EngineError::Storage(other),
        }
    }
}
