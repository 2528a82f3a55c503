//! Process-wide registry of background processing runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Handed to a running task so it can observe cancellation between steps.
#[derive(Debug, Clone)]
pub struct RunToken {
    run_id: u64,
    cancelled: Arc<AtomicBool>,
}

impl RunToken {
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct RunEntry {
    token: RunToken,
    task: JoinHandle<()>,
}

/// At most one live run per execution id.
///
/// Cancellation is cooperative: it only flips the run's flag. The task sees
/// it the next time it checks its [`RunToken`].
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, RunEntry>>,
    next_run_id: AtomicU64,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `make(token)` as the run for `execution_id`.
    ///
    /// A run already registered for the id is cancelled and replaced. The
    /// registry lock is held across the spawn so a task that finishes
    /// immediately cannot deregister before it is registered.
    pub async fn launch<F, Fut>(&self, execution_id: &str, make: F) -> u64
    where
        F: FnOnce(RunToken) -> Fut + Send,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = RunToken {
            run_id: self.next_run_id.fetch_add(1, Ordering::Relaxed) + 1,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        let run_id = token.run_id;

        let mut runs = self.runs.lock().await;
        let task = tokio::spawn(make(token.clone()));
        if let Some(previous) = runs.insert(execution_id.to_string(), RunEntry { token, task }) {
            previous.token.cancelled.store(true, Ordering::Release);
            tracing::debug!(
                execution_id,
                replaced_run = previous.token.run_id,
                run_id,
                "replaced processing run"
            );
        }
        run_id
    }

    /// Flag the run for `execution_id` as cancelled. Returns whether one was
    /// registered.
    pub async fn cancel(&self, execution_id: &str) -> bool {
        match self.runs.lock().await.get(execution_id) {
            Some(entry) => {
                entry.token.cancelled.store(true, Ordering::Release);
                tracing::debug!(execution_id, run_id = entry.token.run_id, "run cancel requested");
                true
            }
            None => false,
        }
    }

    /// Id of the run currently registered for `execution_id`.
    pub async fn current(&self, execution_id: &str) -> Option<u64> {
        self.runs
            .lock()
            .await
            .get(execution_id)
            .map(|entry| entry.token.run_id)
    }

    /// Flag `run_id` only if it is still the registered run for
    /// `execution_id`. A run launched since `run_id` was read is left alone.
    pub async fn cancel_run(&self, execution_id: &str, run_id: u64) -> bool {
        match self.runs.lock().await.get(execution_id) {
            Some(entry) if entry.token.run_id == run_id => {
                entry.token.cancelled.store(true, Ordering::Release);
                tracing::debug!(execution_id, run_id, "run cancel requested");
                true
            }
            _ => false,
        }
    }

    /// Deregister a finished run. Does nothing when `run_id` is no longer the
    /// registered run for the id.
    pub async fn finish(&self, execution_id: &str, run_id: u64) {
        let mut runs = self.runs.lock().await;
        if runs
            .get(execution_id)
            .is_some_and(|entry| entry.token.run_id == run_id)
        {
            runs.remove(execution_id);
        }
    }

    /// Whether a run is registered and not yet cancelled.
    pub async fn is_active(&self, execution_id: &str) -> bool {
        self.runs
            .lock()
            .await
            .get(execution_id)
            .is_some_and(|entry| !entry.token.is_cancelled() && !entry.task.is_finished())
    }

    /// Number of registered runs, cancelled or not.
    pub async fn len(&self) -> usize {
        self.runs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Cancel every run and wait for the tasks to return.
    pub async fn shutdown(&self) {
        let entries: Vec<RunEntry> = self.runs.lock().await.drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.token.cancelled.store(true, Ordering::Release);
        }
        for entry in entries {
            if let Err(err) = entry.task.await {
                tracing::warn!(run_id = entry.token.run_id, error = %err, "processing run panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn stale_finish_keeps_newer_run() {
        let registry = RunRegistry::new();
        let first = launch_sleeper(&registry, "e1").await;
        let second = launch_sleeper(&registry, "e1").await;
        assert_ne!(first, second);

        registry.finish("e1", first).await;
        assert!(registry.is_active("e1").await);

        registry.finish("e1", second).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_a_run_cancels_the_old_token() {
        let registry = RunRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        registry
            .launch("e1", |token| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                let _ = tx.send(token.is_cancelled());
            })
            .await;
        registry.launch("e1", |_| async {}).await;

        assert!(rx.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_only_flags() {
        let registry = RunRegistry::new();
        assert!(!registry.cancel("missing").await);

        let (tx, rx) = tokio::sync::oneshot::channel();
        registry
            .launch("e1", |token| async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                let _ = tx.send(token.is_cancelled());
            })
            .await;
        assert!(registry.cancel("e1").await);
        assert!(!registry.is_active("e1").await);
        // Still registered until the task deregisters itself.
        assert_eq!(registry.len().await, 1);
        assert!(rx.await.unwrap());

        registry.shutdown().await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_run_ignores_a_newer_run() {
        let registry = RunRegistry::new();
        let first = launch_sleeper(&registry, "e1").await;
        assert_eq!(registry.current("e1").await, Some(first));

        let second = launch_sleeper(&registry, "e1").await;
        assert!(!registry.cancel_run("e1", first).await);
        assert!(registry.is_active("e1").await);

        assert!(registry.cancel_run("e1", second).await);
        assert!(!registry.is_active("e1").await);
        assert_eq!(registry.current("missing").await, None);
        registry.shutdown().await;
    }

    async fn launch_sleeper(registry: &RunRegistry, id: &str) -> u64 {
        registry
            .launch(id, |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
            })
            .await
    }
}
