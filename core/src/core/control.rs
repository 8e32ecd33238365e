// conductor/src/core/control.rs

//! Defines how the engine reacts once a task has exhausted its retries.

use serde::{Deserialize, Serialize};

/// Workflow-level error-handling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
  /// Stop scheduling and fail the workflow as soon as any task fails.
  #[default]
  FailFast,
  /// Leave the failed task Failed and keep scheduling unaffected branches.
  Continue,
  /// Like `Continue`, but first run the failed task's `compensate_with` task.
  Compensate,
}

impl ErrorHandling {
  /// Whether a terminal task failure must abort the whole execution.
  pub fn aborts_on_failure(self) -> bool {
    matches!(self, ErrorHandling::FailFast)
  }

  pub fn compensates(self) -> bool {
    matches!(self, ErrorHandling::Compensate)
  }
}
