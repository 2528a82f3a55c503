//! Runs the backend-agnostic conformance suite against `InMemoryStore`.

use vendorflow_storage::conformance::run_conformance_suite;
use vendorflow_storage::InMemoryStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_memory_store_passes_conformance() {
    let report = run_conformance_suite(|| async { InMemoryStore::new() }).await;
    assert!(report.total > 0, "suite ran no tests");
    assert_eq!(report.failed, 0, "{report}");
}
