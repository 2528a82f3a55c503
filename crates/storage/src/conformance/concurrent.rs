use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use super::{make_activity, make_execution, TestResult};
use crate::{Execution, ExecutionStore, StorageError, ACTIVITY_LOG_CAPACITY};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_same_execution_lose_nothing",
        concurrent_updates_same_execution_lose_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_insert_same_id_exactly_one_wins",
        concurrent_insert_same_id_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_executions_all_succeed",
        concurrent_updates_different_executions_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_activity_appends_stay_bounded",
        concurrent_activity_appends_stay_bounded(factory).await,
    ));

    results
}

// ── Concurrent updates to one execution: no lost writes ─────────────────────

/// N tasks each increment a counter on the same execution. Every increment
/// must land: the record lock serializes read-modify-write cycles.
///
/// This exercises real concurrency (`tokio::spawn` creates parallel tasks)
/// that race on the same record.
async fn concurrent_updates_same_execution_lose_nothing<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .insert_execution(make_execution("exec-1", 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.update_execution(
                "exec-1",
                Box::new(|e: &mut Execution| -> Result<(), StorageError> {
                    e.vendors_responded += 1;
                    Ok(())
                }),
            )
            .await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("update: {e}"))?;
    }

    let stored = storage
        .get_execution("exec-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored.vendors_responded as usize != N {
        return Err(format!(
            "expected {N} increments, got {}",
            stored.vendors_responded
        ));
    }
    Ok(())
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

/// N tasks each attempt to insert the same id. Exactly one succeeds;
/// the rest must get AlreadyExists.
async fn concurrent_insert_same_id_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s.insert_execution(make_execution("exec-1", i as i64)).await {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    Ok(())
}

// ── Concurrent updates to different executions: all succeed ─────────────────

/// N tasks each update a different execution. All should succeed and no
/// update may bleed into another record.
async fn concurrent_updates_different_executions_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        storage
            .insert_execution(make_execution(&format!("exec-{i}"), 0))
            .await
            .map_err(|e| format!("insert exec-{i}: {e}"))?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("exec-{i}");
            s.update_execution(
                &id,
                Box::new(move |e: &mut Execution| -> Result<(), StorageError> {
                    e.name = format!("renamed {i}");
                    Ok(())
                }),
            )
            .await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("update: {e}"))?;
    }

    for i in 0..N {
        let stored = storage
            .get_execution(&format!("exec-{i}"))
            .await
            .map_err(|e| format!("get exec-{i}: {e}"))?;
        if stored.name != format!("renamed {i}") {
            return Err(format!("exec-{i} has name '{}'", stored.name));
        }
    }
    Ok(())
}

// ── Concurrent activity appends: bounded, no duplicates ─────────────────────

/// Many tasks append activity at once. The log must end exactly at capacity
/// with distinct entries.
async fn concurrent_activity_appends_stay_bounded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let total = ACTIVITY_LOG_CAPACITY * 3;

    let mut handles = Vec::new();
    for n in 0..total {
        let s = storage.clone();
        handles.push(tokio::spawn(
            async move { s.append_activity(make_activity(n)).await },
        ));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("append: {e}"))?;
    }

    let entries = storage
        .recent_activity()
        .await
        .map_err(|e| format!("recent: {e}"))?;
    if entries.len() != ACTIVITY_LOG_CAPACITY {
        return Err(format!(
            "expected {} entries, got {}",
            ACTIVITY_LOG_CAPACITY,
            entries.len()
        ));
    }
    let distinct: HashSet<&str> = entries.iter().map(|a| a.id.as_str()).collect();
    if distinct.len() != entries.len() {
        return Err("activity log contains duplicate entries".to_string());
    }
    Ok(())
}
