//! Application state shared across request handlers.

use vendorflow_engine::Procurement;

use super::uploads::UploadStore;

pub(crate) struct AppState {
    /// Execution manager, processing engine, and activity feed.
    pub(crate) procurement: Procurement,
    /// Where `/api/upload` writes files.
    pub(crate) uploads: UploadStore,
}
