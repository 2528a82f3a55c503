use std::future::Future;

use super::{make_execution, TestResult};
use crate::{ExecutionStore, StorageError};

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "crud",
            "insert_then_get_returns_document",
            insert_then_get_returns_document(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "insert_duplicate_is_already_exists",
            insert_duplicate_is_already_exists(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "get_missing_is_not_found",
            get_missing_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "delete_returns_document_and_removes_it",
            delete_returns_document_and_removes_it(factory).await,
        ),
        TestResult::from_result(
            "crud",
            "delete_missing_is_not_found",
            delete_missing_is_not_found(factory).await,
        ),
    ]
}

async fn insert_then_get_returns_document<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let fetched = s
        .get_execution("exec-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if fetched != original {
        return Err(format!(
            "fetched document differs from inserted one: {fetched:?}"
        ));
    }
    Ok(())
}

async fn insert_duplicate_is_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_execution(make_execution("exec-1", 0))
        .await
        .map_err(|e| format!("first insert: {e}"))?;

    match s.insert_execution(make_execution("exec-1", 5)).await {
        Err(StorageError::AlreadyExists { execution_id }) if execution_id == "exec-1" => {}
        other => return Err(format!("expected AlreadyExists(exec-1), got {other:?}")),
    }

    // The original document must survive the failed insert.
    let fetched = s
        .get_execution("exec-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if fetched.updated_at != make_execution("exec-1", 0).updated_at {
        return Err("duplicate insert overwrote the stored document".to_string());
    }
    Ok(())
}

async fn get_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_execution("exec-999").await {
        Err(StorageError::ExecutionNotFound { execution_id }) if execution_id == "exec-999" => {
            Ok(())
        }
        other => Err(format!("expected ExecutionNotFound(exec-999), got {other:?}")),
    }
}

async fn delete_returns_document_and_removes_it<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_execution(make_execution("exec-1", 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    s.insert_execution(make_execution("exec-2", 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let removed = s
        .delete_execution("exec-1")
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed.id != "exec-1" {
        return Err(format!("delete returned wrong document: {}", removed.id));
    }

    if !matches!(
        s.get_execution("exec-1").await,
        Err(StorageError::ExecutionNotFound { .. })
    ) {
        return Err("deleted execution is still readable".to_string());
    }
    s.get_execution("exec-2")
        .await
        .map_err(|e| format!("sibling execution lost: {e}"))?;
    Ok(())
}

async fn delete_missing_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.delete_execution("exec-404").await {
        Err(StorageError::ExecutionNotFound { .. }) => Ok(()),
        other => Err(format!("expected ExecutionNotFound, got {other:?}")),
    }
}
