// conductor/src/core/status.rs

//! Lifecycle states of tasks and workflow executions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a single task within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  Running,
  Completed,
  Failed,
  /// The task's condition evaluated false once its dependencies completed.
  Skipped,
  Cancelled,
}

impl TaskStatus {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped | TaskStatus::Cancelled
    )
  }

  /// Terminal states that count toward a Completed workflow.
  pub fn is_successful(self) -> bool {
    matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      TaskStatus::Pending => "pending",
      TaskStatus::Running => "running",
      TaskStatus::Completed => "completed",
      TaskStatus::Failed => "failed",
      TaskStatus::Skipped => "skipped",
      TaskStatus::Cancelled => "cancelled",
    };
    f.write_str(s)
  }
}

/// State of a whole workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
  Created,
  Running,
  Completed,
  Failed,
  Cancelled,
}

impl WorkflowStatus {
  pub fn is_terminal(self) -> bool {
    matches!(
      self,
      WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
    )
  }
}

impl fmt::Display for WorkflowStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      WorkflowStatus::Created => "created",
      WorkflowStatus::Running => "running",
      WorkflowStatus::Completed => "completed",
      WorkflowStatus::Failed => "failed",
      WorkflowStatus::Cancelled => "cancelled",
    };
    f.write_str(s)
  }
}
