//! Bounded background task queue with retries and revocation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use crate::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Download,
    Analysis,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Download => f.write_str("download"),
            TaskKind::Analysis => f.write_str("analysis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl RetryPolicy {
    pub fn download() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            factor: 2.0,
        }
    }

    pub fn analysis() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(120),
            factor: 2.0,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        backoff_delay(retry, self.initial_delay, self.max_delay, self.factor)
    }
}

/// `initial * factor^retry`, capped at `max`.
pub fn backoff_delay(retry: u32, initial: Duration, max: Duration, factor: f64) -> Duration {
    let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
    let delay = initial.as_secs_f64() * factor.powi(exponent);
    if !delay.is_finite() || delay >= max.as_secs_f64() {
        max
    } else {
        Duration::from_secs_f64(delay)
    }
}

/// Cooperative cancellation flag handed to every task attempt.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Revoked)` once the task has been revoked.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Revoked)
        } else {
            Ok(())
        }
    }
}

struct RegisteredTask {
    kind: TaskKind,
    cancel: CancelToken,
    abort: AbortHandle,
}

type Registry = Arc<Mutex<HashMap<Uuid, Arc<RegisteredTask>>>>;

/// A submitted task. Dropping the handle detaches the task; it keeps running.
pub struct TaskHandle<T> {
    task_id: Uuid,
    kind: TaskKind,
    cancel: CancelToken,
    join: JoinHandle<Result<T, PipelineError>>,
}

impl<T> TaskHandle<T> {
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the task's final outcome after all retries.
    pub async fn join(self) -> Result<T, PipelineError> {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(PipelineError::Revoked),
            Err(e) => Err(PipelineError::TaskPanicked(e.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    permits: Arc<Semaphore>,
    tasks: Registry,
}

impl TaskQueue {
    pub fn new(worker_count: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(worker_count.max(1))),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn submit<T, F, Fut>(&self, kind: TaskKind, policy: RetryPolicy, task_fn: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Fn(CancelToken, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, PipelineError>> + Send + 'static,
    {
        self.submit_as(Uuid::new_v4(), kind, policy, task_fn)
    }

    /// Submit under a caller-chosen task id, so the id can be recorded before
    /// the task starts. `task_fn` receives the cancel token and the 0-based
    /// attempt number.
    pub fn submit_as<T, F, Fut>(
        &self,
        task_id: Uuid,
        kind: TaskKind,
        policy: RetryPolicy,
        task_fn: F,
    ) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Fn(CancelToken, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, PipelineError>> + Send + 'static,
    {
        let cancel = CancelToken::new();
        let permits = Arc::clone(&self.permits);
        let registry = Arc::clone(&self.tasks);
        let token = cancel.clone();

        // Held across spawn so the task cannot deregister before it is registered.
        let mut tasks = lock_registry(&self.tasks);
        let join = tokio::spawn(async move {
            let _deregister = Deregister { registry, task_id };
            run_with_retries(kind, task_id, policy, &permits, &token, task_fn).await
        });
        tasks.insert(
            task_id,
            Arc::new(RegisteredTask {
                kind,
                cancel: cancel.clone(),
                abort: join.abort_handle(),
            }),
        );
        drop(tasks);

        tracing::debug!(%task_id, %kind, "task submitted");
        TaskHandle {
            task_id,
            kind,
            cancel,
            join,
        }
    }

    /// Revoke a queued or running task. The task stops at its next
    /// cancellation check; `terminate` also aborts it outright. Returns false
    /// when no such task is live in this queue.
    pub fn revoke(&self, task_id: Uuid, terminate: bool) -> bool {
        let Some(task) = lock_registry(&self.tasks).get(&task_id).cloned() else {
            return false;
        };
        task.cancel.cancel();
        if terminate {
            task.abort.abort();
        }
        tracing::info!(%task_id, kind = %task.kind, terminate, "task revoked");
        true
    }

    pub fn is_active(&self, task_id: Uuid) -> bool {
        lock_registry(&self.tasks).contains_key(&task_id)
    }

    pub fn active_count(&self) -> usize {
        lock_registry(&self.tasks).len()
    }
}

/// Drops the registry entry when the task finishes or is aborted.
struct Deregister {
    registry: Registry,
    task_id: Uuid,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        lock_registry(&self.registry).remove(&self.task_id);
    }
}

fn lock_registry(registry: &Registry) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<RegisteredTask>>> {
    // The map holds no invariants a panicking holder could break.
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_with_retries<T, F, Fut>(
    kind: TaskKind,
    task_id: Uuid,
    policy: RetryPolicy,
    permits: &Semaphore,
    cancel: &CancelToken,
    task_fn: F,
) -> Result<T, PipelineError>
where
    F: Fn(CancelToken, u32) -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;
    loop {
        cancel.check()?;
        let outcome = {
            let _permit = permits.acquire().await.map_err(|_| PipelineError::Revoked)?;
            cancel.check()?;
            task_fn(cancel.clone(), attempt).await
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries && !cancel.is_cancelled() => {
                let delay = policy.delay_for(attempt);
                attempt += 1;
                tracing::warn!(
                    %task_id,
                    %kind,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "task failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                tracing::error!(%task_id, %kind, error = %err, "task failed");
                return Err(err);
            }
        }
    }
}
