// conductor/src/engine/executor.rs

//! Runs a single task to a terminal status: resolves its service, bounds each
//! attempt with the task timeout, retries with backoff and records the
//! outcome on the shared execution.

use crate::core::shared::Shared;
use crate::core::status::TaskStatus;
use crate::core::value::Value;
use crate::engine::config::EngineConfig;
use crate::engine::execution::{TaskResult, WorkflowExecution};
use crate::engine::hooks::{ExecutionEvent, Hooks};
use crate::error::{ConductorError, ConductorResult};
use crate::registry::ServiceRegistry;
use crate::workflow::TaskDefinition;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// Per-execution task runner. Cheap to clone; every clone writes to the same
/// execution state.
#[derive(Clone)]
pub(crate) struct TaskExecutor {
  execution_id: Uuid,
  state: Shared<WorkflowExecution>,
  registry: Arc<ServiceRegistry>,
  hooks: Hooks,
  default_timeout: Option<Duration>,
  compensation_timeout: Option<Duration>,
  permits: Option<Arc<Semaphore>>,
}

impl TaskExecutor {
  pub(crate) fn new(
    execution_id: Uuid,
    state: Shared<WorkflowExecution>,
    registry: Arc<ServiceRegistry>,
    hooks: Hooks,
    config: &EngineConfig,
  ) -> Self {
    Self {
      execution_id,
      state,
      registry,
      hooks,
      default_timeout: config.default_task_timeout,
      compensation_timeout: config.compensation_timeout,
      permits: config.max_concurrent_tasks.map(|n| Arc::new(Semaphore::new(n))),
    }
  }

  pub(crate) fn execution_id(&self) -> Uuid {
    self.execution_id
  }

  pub(crate) fn state(&self) -> &Shared<WorkflowExecution> {
    &self.state
  }

  pub(crate) fn hooks(&self) -> &Hooks {
    &self.hooks
  }

  /// Records the task as Running. Called synchronously at dispatch so the
  /// scheduler never sees a dispatched task as Pending. False if the
  /// execution is already terminal.
  pub(crate) fn begin(&self, task: &TaskDefinition, compensation_for: Option<&str>) -> bool {
    let result = TaskResult::running(task.task_id(), compensation_for.map(str::to_string));
    self.state.with(|exec| exec.record_task(result))
  }

  /// Marks a task whose executor panicked as Failed.
  pub(crate) fn fail_panicked(&self, task_id: &str) -> TaskStatus {
    event!(Level::ERROR, execution_id = %self.execution_id, %task_id, "Task executor panicked.");
    let error = "task panicked".to_string();
    let retry_count = self.retries_recorded(task_id);
    if self.state.with(|exec| exec.end_task(task_id, TaskStatus::Failed, error.clone())) {
      self.hooks.emit(ExecutionEvent::TaskFailed {
        execution_id: self.execution_id,
        task_id: task_id.to_string(),
        retry_count,
        error,
      });
    }
    TaskStatus::Failed
  }

  fn retries_recorded(&self, task_id: &str) -> u32 {
    self
      .state
      .with(|exec| exec.task_result(task_id).map(|r| r.retry_count).unwrap_or(0))
  }

  /// Drives one task (or compensation) to Completed, Failed or Cancelled.
  ///
  /// Compensations run exactly once, without retries, bounded by the
  /// compensation timeout when they declare none of their own.
  #[instrument(
    name = "TaskExecutor::run",
    skip_all,
    fields(execution_id = %self.execution_id, task_id = %task.task_id(), compensation_for = ?compensation_for)
  )]
  pub(crate) async fn run(
    &self,
    task: TaskDefinition,
    compensation_for: Option<String>,
    cancel: CancellationToken,
  ) -> TaskStatus {
    let task_id = task.task_id().to_string();
    let (max_retries, timeout) = match compensation_for {
      Some(_) => (0, task.timeout().or(self.compensation_timeout).or(self.default_timeout)),
      None => (task.retry_count(), task.timeout().or(self.default_timeout)),
    };

    let mut retries: u32 = 0;
    loop {
      let attempt = retries + 1;
      event!(Level::DEBUG, %attempt, max_attempts = max_retries + 1, "Invoking task.");
      self.hooks.emit(ExecutionEvent::TaskStarted {
        execution_id: self.execution_id,
        task_id: task_id.clone(),
        attempt,
      });

      let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return self.cancelled(&task_id),
        outcome = self.invoke(&task, timeout) => outcome,
      };

      match outcome {
        Ok(value) => return self.completed(&task_id, value, retries),
        Err(err) if err.is_retryable() && retries < max_retries => {
          retries += 1;
          let delay = task.backoff().delay_for(task.retry_delay(), retries);
          let error = err.to_string();
          event!(Level::WARN, %attempt, delay_ms = delay.as_millis() as u64, %error, "Task attempt failed; retrying.");
          self.state.with(|exec| exec.record_retry(&task_id, retries, &error));
          self.hooks.emit(ExecutionEvent::TaskRetrying {
            execution_id: self.execution_id,
            task_id: task_id.clone(),
            attempt,
            delay_ms: delay.as_millis() as u64,
            error,
          });

          tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancelled(&task_id),
            _ = tokio::time::sleep(delay) => {}
          }
        }
        Err(err) => return self.failed(&task_id, err, retries),
      }
    }
  }

  /// One attempt: resolve, wait for a concurrency permit, call the service.
  async fn invoke(&self, task: &TaskDefinition, timeout: Option<Duration>) -> ConductorResult<Value> {
    let service = self
      .registry
      .get(task.service_name())
      .ok_or_else(|| ConductorError::ServiceNotFound {
        service_name: task.service_name().to_string(),
      })?;

    let _permit = match &self.permits {
      Some(permits) => Some(
        Arc::clone(permits)
          .acquire_owned()
          .await
          .map_err(|_| ConductorError::Internal("task semaphore closed".to_string()))?,
      ),
      None => None,
    };

    // Snapshot taken after the permit so the call sees the freshest context.
    let context = self.state.with(|exec| exec.context.clone());
    let call = service.execute(task.method(), task.parameters(), &context);

    let value = match timeout {
      Some(limit) => tokio::time::timeout(limit, call)
        .await
        .map_err(|_| ConductorError::TaskTimeout {
          task_id: task.task_id().to_string(),
          timeout: limit,
        })??,
      None => call.await?,
    };
    Ok(value)
  }

  fn completed(&self, task_id: &str, value: Value, retries: u32) -> TaskStatus {
    let recorded = self.state.with(|exec| exec.complete_task(task_id, value));
    if recorded {
      event!(Level::DEBUG, retry_count = retries, "Task completed.");
      self.hooks.emit(ExecutionEvent::TaskCompleted {
        execution_id: self.execution_id,
        task_id: task_id.to_string(),
        retry_count: retries,
      });
    }
    TaskStatus::Completed
  }

  fn failed(&self, task_id: &str, err: ConductorError, retries: u32) -> TaskStatus {
    let error = err.to_string();
    event!(Level::ERROR, retry_count = retries, %error, "Task failed.");
    let recorded = self
      .state
      .with(|exec| exec.end_task(task_id, TaskStatus::Failed, error.clone()));
    if recorded {
      self.hooks.emit(ExecutionEvent::TaskFailed {
        execution_id: self.execution_id,
        task_id: task_id.to_string(),
        retry_count: retries,
        error,
      });
    }
    TaskStatus::Failed
  }

  fn cancelled(&self, task_id: &str) -> TaskStatus {
    event!(Level::INFO, "Task cancelled.");
    // A workflow-level cancel has already marked the task; this covers fail-fast aborts.
    self
      .state
      .with(|exec| exec.end_task(task_id, TaskStatus::Cancelled, ConductorError::Cancelled.to_string()));
    self.hooks.emit(ExecutionEvent::TaskCancelled {
      execution_id: self.execution_id,
      task_id: task_id.to_string(),
    });
    TaskStatus::Cancelled
  }
}
