// conductor/src/engine/hooks.rs

//! Observability hooks for workflow and task lifecycle transitions.
//!
//! Hooks are a pure side channel: they are called outside the execution
//! lock, their panics are contained, and nothing they do feeds back into
//! scheduling.

use crate::core::status::{TaskStatus, WorkflowStatus};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{event, Level};
use uuid::Uuid;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
  WorkflowStarted {
    execution_id: Uuid,
    workflow_id: String,
  },
  WorkflowFinished {
    execution_id: Uuid,
    workflow_id: String,
    status: WorkflowStatus,
    error: Option<String>,
  },
  TaskStarted {
    execution_id: Uuid,
    task_id: String,
    attempt: u32,
  },
  TaskRetrying {
    execution_id: Uuid,
    task_id: String,
    attempt: u32,
    delay_ms: u64,
    error: String,
  },
  TaskCompleted {
    execution_id: Uuid,
    task_id: String,
    retry_count: u32,
  },
  TaskFailed {
    execution_id: Uuid,
    task_id: String,
    retry_count: u32,
    error: String,
  },
  TaskSkipped {
    execution_id: Uuid,
    task_id: String,
  },
  TaskCancelled {
    execution_id: Uuid,
    task_id: String,
  },
  CompensationStarted {
    execution_id: Uuid,
    task_id: String,
    for_task: String,
  },
  CompensationFinished {
    execution_id: Uuid,
    task_id: String,
    for_task: String,
    status: TaskStatus,
  },
}

impl ExecutionEvent {
  pub fn execution_id(&self) -> Uuid {
    match self {
      ExecutionEvent::WorkflowStarted { execution_id, .. }
      | ExecutionEvent::WorkflowFinished { execution_id, .. }
      | ExecutionEvent::TaskStarted { execution_id, .. }
      | ExecutionEvent::TaskRetrying { execution_id, .. }
      | ExecutionEvent::TaskCompleted { execution_id, .. }
      | ExecutionEvent::TaskFailed { execution_id, .. }
      | ExecutionEvent::TaskSkipped { execution_id, .. }
      | ExecutionEvent::TaskCancelled { execution_id, .. }
      | ExecutionEvent::CompensationStarted { execution_id, .. }
      | ExecutionEvent::CompensationFinished { execution_id, .. } => *execution_id,
    }
  }

  /// Task the event concerns, if any.
  pub fn task_id(&self) -> Option<&str> {
    match self {
      ExecutionEvent::WorkflowStarted { .. } | ExecutionEvent::WorkflowFinished { .. } => None,
      ExecutionEvent::TaskStarted { task_id, .. }
      | ExecutionEvent::TaskRetrying { task_id, .. }
      | ExecutionEvent::TaskCompleted { task_id, .. }
      | ExecutionEvent::TaskFailed { task_id, .. }
      | ExecutionEvent::TaskSkipped { task_id, .. }
      | ExecutionEvent::TaskCancelled { task_id, .. }
      | ExecutionEvent::CompensationStarted { task_id, .. }
      | ExecutionEvent::CompensationFinished { task_id, .. } => Some(task_id),
    }
  }
}

/// Receives execution events.
///
/// Implementations decide what to do with them (log, count, forward). They
/// are called synchronously from the engine and should return quickly.
pub trait ExecutionHook: Send + Sync {
  fn on_event(&self, event: &ExecutionEvent);
}

/// The set of hooks attached to an engine.
#[derive(Clone, Default)]
pub(crate) struct Hooks(Arc<[Arc<dyn ExecutionHook>]>);

impl Hooks {
  /// A copy of this set with `hook` appended.
  pub(crate) fn with(&self, hook: Arc<dyn ExecutionHook>) -> Self {
    let mut hooks = self.0.to_vec();
    hooks.push(hook);
    Hooks(hooks.into())
  }

  pub(crate) fn len(&self) -> usize {
    self.0.len()
  }

  pub(crate) fn emit(&self, event: ExecutionEvent) {
    for hook in self.0.iter() {
      if catch_unwind(AssertUnwindSafe(|| hook.on_event(&event))).is_err() {
        event!(Level::ERROR, execution_id = %event.execution_id(), "Execution hook panicked; ignoring.");
      }
    }
  }
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHook;

impl ExecutionHook for TracingHook {
  fn on_event(&self, e: &ExecutionEvent) {
    match e {
      ExecutionEvent::WorkflowStarted { execution_id, workflow_id } => {
        event!(Level::INFO, %execution_id, %workflow_id, "workflow_started");
      }
      ExecutionEvent::WorkflowFinished {
        execution_id,
        workflow_id,
        status,
        error,
      } => match status {
        WorkflowStatus::Completed => event!(Level::INFO, %execution_id, %workflow_id, "workflow_completed"),
        _ => event!(Level::WARN, %execution_id, %workflow_id, %status, error = ?error, "workflow_finished"),
      },
      ExecutionEvent::TaskStarted {
        execution_id,
        task_id,
        attempt,
      } => event!(Level::DEBUG, %execution_id, %task_id, attempt, "task_started"),
      ExecutionEvent::TaskRetrying {
        execution_id,
        task_id,
        attempt,
        delay_ms,
        error,
      } => event!(Level::WARN, %execution_id, %task_id, attempt, delay_ms, %error, "task_retrying"),
      ExecutionEvent::TaskCompleted {
        execution_id,
        task_id,
        retry_count,
      } => event!(Level::INFO, %execution_id, %task_id, retry_count, "task_completed"),
      ExecutionEvent::TaskFailed {
        execution_id,
        task_id,
        retry_count,
        error,
      } => event!(Level::ERROR, %execution_id, %task_id, retry_count, %error, "task_failed"),
      ExecutionEvent::TaskSkipped { execution_id, task_id } => {
        event!(Level::INFO, %execution_id, %task_id, "task_skipped");
      }
      ExecutionEvent::TaskCancelled { execution_id, task_id } => {
        event!(Level::WARN, %execution_id, %task_id, "task_cancelled");
      }
      ExecutionEvent::CompensationStarted {
        execution_id,
        task_id,
        for_task,
      } => event!(Level::WARN, %execution_id, %task_id, %for_task, "compensation_started"),
      ExecutionEvent::CompensationFinished {
        execution_id,
        task_id,
        for_task,
        status,
      } => event!(Level::WARN, %execution_id, %task_id, %for_task, %status, "compensation_finished"),
    }
  }
}

/// Forwards events to an unbounded channel for asynchronous consumers.
#[derive(Debug, Clone)]
pub struct ChannelHook {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelHook {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }

  /// Creates a hook together with the receiving end of its channel.
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExecutionEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self { sender }, receiver)
  }
}

impl ExecutionHook for ChannelHook {
  fn on_event(&self, event: &ExecutionEvent) {
    // Receiver may have been dropped.
    let _ = self.sender.send(event.clone());
  }
}

/// Counts lifecycle transitions across every execution of an engine.
#[derive(Debug, Default)]
pub struct MetricsHook {
  workflows_started: AtomicU64,
  workflows_completed: AtomicU64,
  workflows_failed: AtomicU64,
  workflows_cancelled: AtomicU64,
  tasks_started: AtomicU64,
  tasks_completed: AtomicU64,
  tasks_failed: AtomicU64,
  tasks_skipped: AtomicU64,
  tasks_cancelled: AtomicU64,
  task_retries: AtomicU64,
  compensations: AtomicU64,
}

/// Point-in-time copy of [`MetricsHook`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
  pub workflows_started: u64,
  pub workflows_completed: u64,
  pub workflows_failed: u64,
  pub workflows_cancelled: u64,
  /// Counts attempts, so a task retried twice contributes three.
  pub tasks_started: u64,
  pub tasks_completed: u64,
  pub tasks_failed: u64,
  pub tasks_skipped: u64,
  pub tasks_cancelled: u64,
  pub task_retries: u64,
  pub compensations: u64,
}

impl MetricsHook {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      workflows_started: self.workflows_started.load(Ordering::Relaxed),
      workflows_completed: self.workflows_completed.load(Ordering::Relaxed),
      workflows_failed: self.workflows_failed.load(Ordering::Relaxed),
      workflows_cancelled: self.workflows_cancelled.load(Ordering::Relaxed),
      tasks_started: self.tasks_started.load(Ordering::Relaxed),
      tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
      tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
      tasks_skipped: self.tasks_skipped.load(Ordering::Relaxed),
      tasks_cancelled: self.tasks_cancelled.load(Ordering::Relaxed),
      task_retries: self.task_retries.load(Ordering::Relaxed),
      compensations: self.compensations.load(Ordering::Relaxed),
    }
  }
}

impl ExecutionHook for MetricsHook {
  fn on_event(&self, event: &ExecutionEvent) {
    let counter = match event {
      ExecutionEvent::WorkflowStarted { .. } => &self.workflows_started,
      ExecutionEvent::WorkflowFinished { status, .. } => match status {
        WorkflowStatus::Completed => &self.workflows_completed,
        WorkflowStatus::Cancelled => &self.workflows_cancelled,
        _ => &self.workflows_failed,
      },
      ExecutionEvent::TaskStarted { .. } => &self.tasks_started,
      ExecutionEvent::TaskRetrying { .. } => &self.task_retries,
      ExecutionEvent::TaskCompleted { .. } => &self.tasks_completed,
      ExecutionEvent::TaskFailed { .. } => &self.tasks_failed,
      ExecutionEvent::TaskSkipped { .. } => &self.tasks_skipped,
      ExecutionEvent::TaskCancelled { .. } => &self.tasks_cancelled,
      ExecutionEvent::CompensationStarted { .. } => &self.compensations,
      ExecutionEvent::CompensationFinished { .. } => return,
    };
    counter.fetch_add(1, Ordering::Relaxed);
  }
}

impl<H: ExecutionHook + ?Sized> ExecutionHook for Arc<H> {
  fn on_event(&self, event: &ExecutionEvent) {
    (**self).on_event(event)
  }
}
