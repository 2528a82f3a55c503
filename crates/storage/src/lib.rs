pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{InMemoryStore, ACTIVITY_LOG_CAPACITY};
pub use record::{
    ActivityEntry, ActivityKind, Execution, ExecutionStatus, Guardrails, Material, MaterialId,
    MaterialResult, ProcessingStatus, Vendor, VendorStatus,
};
pub use traits::{ExecutionStore, Mutation};
