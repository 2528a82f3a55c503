//! Procurement execution tracking.
//!
//! [`Procurement`] wires the pieces over one [`ExecutionStore`]:
//!
//! - [`ExecutionManager`]: create, read, update, delete, list, vendor status
//! - [`ProcessingEngine`]: background per-material runs, polling, cancel, research
//! - [`ActivityRecorder`]: the bounded recent-activity feed
//!
//! Vendor outreach is simulated behind [`OutreachSimulator`]. Materials can be
//! imported from CSV with [`importer::import_materials`].

pub mod activity;
mod error;
pub mod executions;
pub mod importer;
pub mod outreach;
pub mod processing;
pub mod runs;
pub mod vendors;

use std::sync::Arc;

use vendorflow_storage::{ExecutionStore, InMemoryStore};

pub use activity::ActivityRecorder;
pub use error::{EngineError, ErrorKind};
pub use executions::{ExecutionManager, ExecutionPatch, NewExecution};
pub use importer::{ImportError, MaterialImport};
pub use outreach::{FixedOutreach, OutreachError, OutreachSimulator, Quote, RandomOutreach};
pub use processing::{EngineConfig, ProcessingEngine, ProcessingSnapshot};
pub use runs::RunRegistry;
pub use vendors::VendorStatusUpdate;

/// Everything the API needs, sharing one store and one run registry.
#[derive(Clone)]
pub struct Procurement {
    pub executions: ExecutionManager,
    pub processing: ProcessingEngine,
    pub activity: ActivityRecorder,
}

impl Procurement {
    pub fn new(
        store: Arc<dyn ExecutionStore>,
        simulator: Arc<dyn OutreachSimulator>,
        config: EngineConfig,
    ) -> Self {
        let activity = ActivityRecorder::new(store.clone());
        let runs = Arc::new(RunRegistry::new());
        Self {
            executions: ExecutionManager::new(store.clone(), activity.clone(), runs.clone()),
            processing: ProcessingEngine::new(store, activity.clone(), simulator, runs, config),
            activity,
        }
    }

    /// In-memory store with randomized outreach.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(RandomOutreach),
            config,
        )
    }

    /// Cancel all runs and wait for them to stop.
    pub async fn shutdown(&self) {
        self.processing.runs().shutdown().await;
    }
}
