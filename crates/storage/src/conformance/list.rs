use std::future::Future;

use super::{make_execution, make_execution_with_status, TestResult};
use crate::{ExecutionStatus, ExecutionStore};

pub(super) async fn run_list_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "list",
            "list_empty_store_is_empty",
            list_empty_store_is_empty(factory).await,
        ),
        TestResult::from_result(
            "list",
            "list_orders_newest_updated_first",
            list_orders_newest_updated_first(factory).await,
        ),
        TestResult::from_result(
            "list",
            "list_ties_break_by_latest_insertion",
            list_ties_break_by_latest_insertion(factory).await,
        ),
        TestResult::from_result(
            "list",
            "list_filters_by_status",
            list_filters_by_status(factory).await,
        ),
    ]
}

fn ids(executions: &[crate::Execution]) -> Vec<&str> {
    executions.iter().map(|e| e.id.as_str()).collect()
}

async fn list_empty_store_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let all = s
        .list_executions(None)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !all.is_empty() {
        return Err(format!("expected empty list, got {:?}", ids(&all)));
    }
    Ok(())
}

async fn list_orders_newest_updated_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    // Inserted out of recency order on purpose.
    for (id, offset) in [("middle", 10), ("oldest", 0), ("newest", 20)] {
        s.insert_execution(make_execution(id, offset))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }

    let all = s
        .list_executions(None)
        .await
        .map_err(|e| format!("list: {e}"))?;
    let got = ids(&all);
    if got != ["newest", "middle", "oldest"] {
        return Err(format!("expected [newest, middle, oldest], got {got:?}"));
    }
    Ok(())
}

async fn list_ties_break_by_latest_insertion<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in ["first", "second", "third"] {
        s.insert_execution(make_execution(id, 0))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }

    let all = s
        .list_executions(None)
        .await
        .map_err(|e| format!("list: {e}"))?;
    let got = ids(&all);
    if got != ["third", "second", "first"] {
        return Err(format!("expected [third, second, first], got {got:?}"));
    }
    Ok(())
}

async fn list_filters_by_status<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let seed = [
        ("d1", 0, ExecutionStatus::Draft),
        ("s1", 1, ExecutionStatus::EmailSent),
        ("d2", 2, ExecutionStatus::Draft),
        ("r1", 3, ExecutionStatus::VendorResponded),
    ];
    for (id, offset, status) in seed {
        s.insert_execution(make_execution_with_status(id, offset, status))
            .await
            .map_err(|e| format!("insert {id}: {e}"))?;
    }

    let drafts = s
        .list_executions(Some(ExecutionStatus::Draft))
        .await
        .map_err(|e| format!("list drafts: {e}"))?;
    if ids(&drafts) != ["d2", "d1"] {
        return Err(format!("expected drafts [d2, d1], got {:?}", ids(&drafts)));
    }

    let completed = s
        .list_executions(Some(ExecutionStatus::Completed))
        .await
        .map_err(|e| format!("list completed: {e}"))?;
    if !completed.is_empty() {
        return Err(format!(
            "expected no completed executions, got {:?}",
            ids(&completed)
        ));
    }
    Ok(())
}
