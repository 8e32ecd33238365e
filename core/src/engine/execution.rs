// conductor/src/engine/execution.rs

//! Runtime state of one workflow run: per-task results, the shared context
//! and the overall status.
//!
//! All mutation goes through methods that refuse to touch an execution once
//! it has reached a terminal status, so a late-finishing task can never
//! rewrite a finished run.

use crate::core::status::{TaskStatus, WorkflowStatus};
use crate::core::value::{merge_result, Context, Value};
use crate::workflow::WorkflowDefinition;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome record for a single task within an execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
  pub task_id: String,
  pub status: TaskStatus,
  pub result: Option<Value>,
  pub error: Option<String>,
  pub start_time: Option<DateTime<Utc>>,
  pub end_time: Option<DateTime<Utc>>,
  /// Retries actually consumed, not counting the first attempt.
  pub retry_count: u32,
  /// Set when the task ran as the compensation of another task.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub compensation_for: Option<String>,
}

impl TaskResult {
  pub(crate) fn running(task_id: &str, compensation_for: Option<String>) -> Self {
    Self {
      task_id: task_id.to_string(),
      status: TaskStatus::Running,
      result: None,
      error: None,
      start_time: Some(Utc::now()),
      end_time: None,
      retry_count: 0,
      compensation_for,
    }
  }

  pub(crate) fn skipped(task_id: &str) -> Self {
    let now = Utc::now();
    Self {
      task_id: task_id.to_string(),
      status: TaskStatus::Skipped,
      result: None,
      error: None,
      start_time: Some(now),
      end_time: Some(now),
      retry_count: 0,
      compensation_for: None,
    }
  }

  pub fn duration(&self) -> Option<chrono::Duration> {
    Some(self.end_time? - self.start_time?)
  }
}

/// Runtime record of one workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowExecution {
  pub execution_id: Uuid,
  pub workflow_id: String,
  #[serde(skip)]
  definition: Arc<WorkflowDefinition>,
  pub status: WorkflowStatus,
  pub task_results: HashMap<String, TaskResult>,
  pub context: Context,
  pub created_at: DateTime<Utc>,
  pub start_time: Option<DateTime<Utc>>,
  pub end_time: Option<DateTime<Utc>>,
  pub error: Option<String>,
}

impl WorkflowExecution {
  pub(crate) fn new(execution_id: Uuid, definition: Arc<WorkflowDefinition>, initial_context: Context) -> Self {
    Self {
      execution_id,
      workflow_id: definition.workflow_id().to_string(),
      definition,
      status: WorkflowStatus::Created,
      task_results: HashMap::new(),
      context: initial_context,
      created_at: Utc::now(),
      start_time: None,
      end_time: None,
      error: None,
    }
  }

  pub fn definition(&self) -> &Arc<WorkflowDefinition> {
    &self.definition
  }

  pub fn task_result(&self, task_id: &str) -> Option<&TaskResult> {
    self.task_results.get(task_id)
  }

  pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
    self.task_results.get(task_id).map(|r| r.status)
  }

  pub fn is_terminal(&self) -> bool {
    self.status.is_terminal()
  }

  pub fn duration(&self) -> Option<chrono::Duration> {
    Some(self.end_time? - self.start_time?)
  }

  /// Created → Running. False if the run was cancelled before it started.
  pub(crate) fn mark_running(&mut self) -> bool {
    if self.status != WorkflowStatus::Created {
      return false;
    }
    self.status = WorkflowStatus::Running;
    self.start_time = Some(Utc::now());
    true
  }

  pub(crate) fn is_task_completed(&self, task_id: &str) -> bool {
    self.task_status(task_id) == Some(TaskStatus::Completed)
  }

  /// Inserts or replaces a task's result.
  pub(crate) fn record_task(&mut self, result: TaskResult) -> bool {
    if self.is_terminal() {
      return false;
    }
    self.task_results.insert(result.task_id.clone(), result);
    true
  }

  pub(crate) fn record_retry(&mut self, task_id: &str, retry_count: u32, error: &str) {
    if self.is_terminal() {
      return;
    }
    if let Some(result) = self.task_results.get_mut(task_id) {
      result.retry_count = retry_count;
      result.error = Some(error.to_string());
    }
  }

  /// Completes a task and merges its output into the shared context.
  pub(crate) fn complete_task(&mut self, task_id: &str, value: Value) -> bool {
    if self.is_terminal() {
      return false;
    }
    merge_result(&mut self.context, task_id, &value);
    match self.task_results.get_mut(task_id) {
      Some(result) => {
        result.status = TaskStatus::Completed;
        result.result = Some(value);
        result.error = None;
        result.end_time = Some(Utc::now());
        true
      }
      None => false,
    }
  }

  /// Moves a task to Failed or Cancelled with the given message.
  pub(crate) fn end_task(&mut self, task_id: &str, status: TaskStatus, error: String) -> bool {
    if self.is_terminal() {
      return false;
    }
    match self.task_results.get_mut(task_id) {
      Some(result) => {
        result.status = status;
        result.error = Some(error);
        result.end_time = Some(Utc::now());
        true
      }
      None => false,
    }
  }

  /// Records a terminal workflow status. No-op if already terminal.
  pub(crate) fn finish(&mut self, status: WorkflowStatus, error: Option<String>) -> bool {
    if self.is_terminal() {
      return false;
    }
    self.status = status;
    self.error = error;
    self.end_time = Some(Utc::now());
    true
  }

  /// Forces Cancelled, marking every Running task Cancelled in the same step.
  /// Returns the ids of the tasks it interrupted, or `None` if the execution
  /// was already terminal.
  pub(crate) fn cancel(&mut self, reason: &str) -> Option<Vec<String>> {
    if self.is_terminal() {
      return None;
    }
    let now = Utc::now();
    let mut interrupted = Vec::new();
    for result in self.task_results.values_mut() {
      if result.status == TaskStatus::Running {
        result.status = TaskStatus::Cancelled;
        result.error = Some(reason.to_string());
        result.end_time = Some(now);
        interrupted.push(result.task_id.clone());
      }
    }
    interrupted.sort();
    self.finish(WorkflowStatus::Cancelled, Some(reason.to_string()));
    Some(interrupted)
  }
}
