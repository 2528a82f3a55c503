use std::future::Future;

use super::{make_execution, TestResult};
use crate::{Execution, ExecutionStatus, ExecutionStore, StorageError};

pub(super) async fn run_mutation_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "mutation",
            "update_commits_and_returns_document",
            update_commits_and_returns_document(factory).await,
        ),
        TestResult::from_result(
            "mutation",
            "rejected_mutation_leaves_document_unchanged",
            rejected_mutation_leaves_document_unchanged(factory).await,
        ),
        TestResult::from_result(
            "mutation",
            "mutation_error_is_returned_verbatim",
            mutation_error_is_returned_verbatim(factory).await,
        ),
        TestResult::from_result(
            "mutation",
            "update_missing_is_not_found",
            update_missing_is_not_found(factory).await,
        ),
    ]
}

async fn update_commits_and_returns_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_execution(make_execution("exec-1", 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let returned = s
        .update_execution(
            "exec-1",
            Box::new(|e: &mut Execution| -> Result<(), StorageError> {
                e.status = ExecutionStatus::EmailSent;
                e.vendors_contacted = 5;
                Ok(())
            }),
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    if returned.status != ExecutionStatus::EmailSent || returned.vendors_contacted != 5 {
        return Err(format!("update returned stale document: {returned:?}"));
    }

    let stored = s
        .get_execution("exec-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored != returned {
        return Err("stored document differs from the one update returned".to_string());
    }
    Ok(())
}

async fn rejected_mutation_leaves_document_unchanged<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let original = make_execution("exec-1", 0);
    s.insert_execution(original.clone())
        .await
        .map_err(|e| format!("insert: {e}"))?;

    // Changes made before the closure fails must be discarded.
    let result = s
        .update_execution(
            "exec-1",
            Box::new(|e: &mut Execution| {
                e.name = "half-written".to_string();
                e.processing_status.is_processing = true;
                Err(StorageError::Rejected {
                    execution_id: e.id.clone(),
                    reason: "test rejection".to_string(),
                })
            }),
        )
        .await;
    if !matches!(result, Err(StorageError::Rejected { .. })) {
        return Err(format!("expected Rejected, got {result:?}"));
    }

    let stored = s
        .get_execution("exec-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored != original {
        return Err(format!("rejected mutation leaked changes: {stored:?}"));
    }
    Ok(())
}

async fn mutation_error_is_returned_verbatim<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_execution(make_execution("exec-1", 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let result = s
        .update_execution(
            "exec-1",
            Box::new(|e: &mut Execution| {
                Err(StorageError::VendorNotFound {
                    execution_id: e.id.clone(),
                    index: 7,
                })
            }),
        )
        .await;
    match result {
        Err(StorageError::VendorNotFound { execution_id, index })
            if execution_id == "exec-1" && index == 7 =>
        {
            Ok(())
        }
        other => Err(format!("expected VendorNotFound(exec-1, 7), got {other:?}")),
    }
}

async fn update_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let result = s
        .update_execution(
            "exec-404",
            Box::new(|_: &mut Execution| -> Result<(), StorageError> { Ok(()) }),
        )
        .await;
    match result {
        Err(StorageError::ExecutionNotFound { execution_id }) if execution_id == "exec-404" => {
            Ok(())
        }
        other => Err(format!("expected ExecutionNotFound(exec-404), got {other:?}")),
    }
}
