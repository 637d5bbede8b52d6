//! resilience/timeout_guard.rs
//! Dos deadlines independientes: uno por intento y otro para la tarea entera.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::executor_config::ExecutorConfig;
use crate::resilience::error_classifier::RawFailure;

#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    pub attempt: Duration,
    pub task: Duration,
}

/// La tarea completa se pasó de su deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTimedOut(pub Duration);

impl Default for TimeoutGuard {
    fn default() -> Self {
        TimeoutGuard {
            attempt: Duration::from_secs(30),
            task: Duration::from_secs(120),
        }
    }
}

impl TimeoutGuard {
    pub fn new(attempt: Duration, task: Duration) -> Self {
        TimeoutGuard { attempt, task }
    }

    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        TimeoutGuard::new(cfg.attempt_timeout(), cfg.task_timeout())
    }

    /// Un intento contra el proveedor. Vencido => `RawFailure::AttemptTimeout`.
    pub async fn run_attempt<F, T>(&self, call: F) -> Result<T, RawFailure>
    where
        F: Future<Output = Result<T, RawFailure>>,
    {
        match timeout(self.attempt, call).await {
            Ok(result) => result,
            Err(_) => Err(RawFailure::AttemptTimeout),
        }
    }

    /// La tarea entera. Al vencer se descarta el future, lo que cancela el
    /// intento en curso (y suelta su slot del semáforo).
    pub async fn run_task<F>(&self, task: F) -> Result<F::Output, TaskTimedOut>
    where
        F: Future,
    {
        timeout(self.task, task)
            .await
            .map_err(|_| TaskTimedOut(self.task))
    }
}
