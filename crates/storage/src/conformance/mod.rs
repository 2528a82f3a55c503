//! Conformance test suite for `ExecutionStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `ExecutionStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **CRUD**: insert, get, delete, duplicate and missing-id errors
//! - **Listing**: recency ordering, tie-breaking, status filtering
//! - **Mutation**: committed changes, all-or-nothing rejection
//! - **Activity log**: newest-first order, bounded retention
//! - **Concurrency**: no lost updates on one record, no false contention
//!   across records, serialized activity appends
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use vendorflow_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn mongo_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_mongo_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```
//!
//! The activity tests assume the backend retains [`ACTIVITY_LOG_CAPACITY`]
//! entries.
//!
//! [`ACTIVITY_LOG_CAPACITY`]: crate::ACTIVITY_LOG_CAPACITY

mod activity;
mod concurrent;
mod crud;
mod list;
mod mutation;

use std::fmt;
use std::future::Future;

use time::{Duration, OffsetDateTime};

use crate::record::{
    ActivityEntry, ActivityKind, Execution, ExecutionStatus, Guardrails, Material, MaterialId,
};
use crate::ExecutionStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "crud", "list", "activity").
    pub category: String,
    /// Test name (e.g. "insert_then_get_returns_document").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(crud::run_crud_tests(&factory).await);
    results.extend(list::run_list_tests(&factory).await);
    results.extend(mutation::run_mutation_tests(&factory).await);
    results.extend(activity::run_activity_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

/// Fixed base instant so ordering assertions never depend on the wall clock.
fn base_time() -> OffsetDateTime {
    time::macros::datetime!(2025-01-01 00:00:00 UTC)
}

/// A draft execution with one material, updated `offset_secs` after the base time.
fn make_execution(id: &str, offset_secs: i64) -> Execution {
    let at = base_time() + Duration::seconds(offset_secs);
    let mut execution = Execution::draft(
        id,
        format!("execution {id}"),
        vec![Material::new(Some(MaterialId::Seq(1)), "Sugar", 10.0, 50.0)],
        Guardrails::default(),
        at,
    );
    execution.updated_at = at;
    execution
}

fn make_execution_with_status(id: &str, offset_secs: i64, status: ExecutionStatus) -> Execution {
    let mut execution = make_execution(id, offset_secs);
    execution.status = status;
    execution
}

fn make_activity(n: usize) -> ActivityEntry {
    ActivityEntry {
        id: format!("activity-{n}"),
        execution_name: format!("execution {n}"),
        activity_type: ActivityKind::Created,
        details: "Execution created".to_string(),
        timestamp: base_time() + Duration::seconds(n as i64),
    }
}
