//! Bounded executor for blocking I/O
//!
//! Integrations whose device libraries block (HTTP clients, serial ports)
//! hand each call to [`Executor::run`]. Calls run on tokio's blocking pool,
//! at most `max_workers` at a time, and every call is bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{trace, warn};

/// Default number of blocking jobs allowed to run at once
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default time a single blocking job may take
pub const DEFAULT_EXECUTOR_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from running a job on the executor
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    /// The job did not finish in time; its worker slot stays busy until it does
    #[error("executor job timed out after {0:?}")]
    Timeout(Duration),

    /// The job panicked or was cancelled
    #[error("executor job failed: {0}")]
    JobFailed(String),

    /// The executor was shut down
    #[error("executor is closed")]
    Closed,
}

/// Runs blocking jobs with a worker bound and a per-job timeout
#[derive(Debug, Clone)]
pub struct Executor {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl Executor {
    /// Create an executor running at most `max_workers` jobs at once
    pub fn new(max_workers: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_workers.max(1))),
            timeout,
        }
    }

    /// The per-job timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a blocking job and wait for its result
    ///
    /// The caller is suspended until the job completes, fails, or times out.
    pub async fn run<F, T>(&self, job: F) -> Result<T, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ExecutorError::Closed)?;

        trace!("Dispatching executor job");
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!("Executor job failed: {}", err);
                Err(ExecutorError::JobFailed(err.to_string()))
            }
            Err(_) => {
                warn!("Executor job timed out after {:?}", self.timeout);
                Err(ExecutorError::Timeout(self.timeout))
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS, DEFAULT_EXECUTOR_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_run_returns_job_result() {
        let executor = Executor::default();
        let value = assert_ok!(executor.run(|| 40 + 2).await);
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let executor = Executor::new(1, Duration::from_millis(20));
        let result = executor
            .run(|| std::thread::sleep(Duration::from_millis(300)))
            .await;
        assert_eq!(
            assert_err!(result),
            ExecutorError::Timeout(Duration::from_millis(20))
        );
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported() {
        let executor = Executor::default();
        let result: Result<(), _> = executor.run(|| panic!("device exploded")).await;
        assert!(matches!(result, Err(ExecutorError::JobFailed(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_bound_is_respected() {
        let executor = Executor::new(1, Duration::from_secs(5));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..3).map(|_| {
            let executor = executor.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                executor
                    .run(move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(30));
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            })
        });

        for job in jobs.collect::<Vec<_>>() {
            assert_ok!(job.await.unwrap());
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
