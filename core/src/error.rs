// conductor/src/error.rs
use anyhow::Error as AnyhowError;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::condition::ConditionError;

#[derive(Debug, Error)]
pub enum ConductorError {
  #[error("Invalid workflow definition '{workflow_id}': {message}")]
  InvalidDefinition { workflow_id: String, message: String },

  #[error("Duplicate task id '{task_id}' in workflow '{workflow_id}'")]
  DuplicateTask { workflow_id: String, task_id: String },

  #[error("Task '{task_id}' depends on unknown task '{dependency}'")]
  UnknownDependency { task_id: String, dependency: String },

  #[error("Task '{task_id}' compensates with unknown task '{compensation}'")]
  UnknownCompensation { task_id: String, compensation: String },

  #[error("Dependency cycle detected in workflow '{workflow_id}' at task '{task_id}'")]
  DependencyCycle { workflow_id: String, task_id: String },

  #[error("Invalid condition on task '{task_id}': {source}")]
  InvalidCondition {
    task_id: String,
    #[source]
    source: ConditionError,
  },

  #[error("service not found: {service_name}")]
  ServiceNotFound { service_name: String },

  #[error("task '{task_id}' timed out after {timeout:?}")]
  TaskTimeout { task_id: String, timeout: Duration },

  #[error("service call failed: {source}")]
  ServiceFailure {
    #[source]
    source: AnyhowError,
  },

  #[error("execution cancelled")]
  Cancelled,

  #[error("Execution not found: {execution_id}")]
  ExecutionNotFound { execution_id: Uuid },

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Internal conductor error: {0}")]
  Internal(String),
}

impl ConductorError {
  /// Whether the task executor may spend a retry on this error.
  ///
  /// A missing service is a configuration defect and cancellation is never
  /// retried; everything coming back from the downstream call is.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      ConductorError::ServiceFailure { .. } | ConductorError::TaskTimeout { .. }
    )
  }
}

impl From<AnyhowError> for ConductorError {
  fn from(err: AnyhowError) -> Self {
    // Don't bury a ConductorError raised inside a service under ServiceFailure.
    match err.downcast::<ConductorError>() {
      Ok(conductor_err) => conductor_err,
      Err(err) => ConductorError::ServiceFailure { source: err },
    }
  }
}

pub type ConductorResult<T, E = ConductorError> = std::result::Result<T, E>;
