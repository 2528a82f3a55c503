use std::future::Future;

use super::{make_activity, TestResult};
use crate::{ExecutionStore, ACTIVITY_LOG_CAPACITY};

pub(super) async fn run_activity_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "activity",
            "activity_starts_empty",
            activity_starts_empty(factory).await,
        ),
        TestResult::from_result(
            "activity",
            "activity_is_newest_first",
            activity_is_newest_first(factory).await,
        ),
        TestResult::from_result(
            "activity",
            "activity_evicts_oldest_beyond_capacity",
            activity_evicts_oldest_beyond_capacity(factory).await,
        ),
    ]
}

async fn activity_starts_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let entries = s
        .recent_activity()
        .await
        .map_err(|e| format!("recent: {e}"))?;
    if !entries.is_empty() {
        return Err(format!("expected no activity, got {}", entries.len()));
    }
    Ok(())
}

async fn activity_is_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for n in 0..3 {
        s.append_activity(make_activity(n))
            .await
            .map_err(|e| format!("append {n}: {e}"))?;
    }

    let got: Vec<String> = s
        .recent_activity()
        .await
        .map_err(|e| format!("recent: {e}"))?
        .into_iter()
        .map(|a| a.id)
        .collect();
    if got != ["activity-2", "activity-1", "activity-0"] {
        return Err(format!("expected newest first, got {got:?}"));
    }
    Ok(())
}

/// Eviction follows insertion order, not the `timestamp` field.
async fn activity_evicts_oldest_beyond_capacity<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: ExecutionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let extra = 5;
    let total = ACTIVITY_LOG_CAPACITY + extra;

    // Timestamps run backwards so a timestamp-based eviction would keep the
    // wrong entries.
    for n in 0..total {
        let mut entry = make_activity(n);
        entry.timestamp = make_activity(total - n).timestamp;
        s.append_activity(entry)
            .await
            .map_err(|e| format!("append {n}: {e}"))?;
    }

    let entries = s
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

    let newest = format!("activity-{}", total - 1);
    let oldest_kept = format!("activity-{}", extra);
    if entries.first().map(|a| a.id.as_str()) != Some(newest.as_str()) {
        return Err(format!("expected {newest} first, got {:?}", entries.first()));
    }
    if entries.last().map(|a| a.id.as_str()) != Some(oldest_kept.as_str()) {
        return Err(format!(
            "expected {oldest_kept} last, got {:?}",
            entries.last()
        ));
    }
    Ok(())
}
