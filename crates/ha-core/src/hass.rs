//! The handle integrations receive from the host runtime

use std::sync::Arc;

use crate::{Executor, ExecutorError, StateMachine};

/// Shared host runtime services handed to integrations
///
/// Cloning is cheap; every clone refers to the same state machine and
/// executor.
#[derive(Clone, Default)]
pub struct HomeAssistant {
    /// State machine for entity states
    pub states: Arc<StateMachine>,
    /// Executor for blocking device I/O
    pub executor: Executor,
}

impl HomeAssistant {
    /// Create a host handle with a fresh state machine
    pub fn new(executor: Executor) -> Self {
        Self {
            states: Arc::new(StateMachine::new()),
            executor,
        }
    }

    /// Run a blocking job on the executor
    pub async fn add_executor_job<F, T>(&self, job: F) -> Result<T, ExecutorError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.executor.run(job).await
    }
}
