// conductor/src/engine/scheduler.rs

//! The per-execution scheduling loop.
//!
//! Readiness is recomputed whenever a dispatched task finishes; there is no
//! polling interval. Ready tasks are dispatched in parallel groups (tasks with
//! an identical dependency set), each task as its own unit in a `JoinSet`.

use crate::condition::ConditionEvaluator;
use crate::core::status::{TaskStatus, WorkflowStatus};
use crate::engine::execution::TaskResult;
use crate::engine::executor::TaskExecutor;
use crate::engine::hooks::ExecutionEvent;
use crate::workflow::graph;
use crate::workflow::{TaskDefinition, WorkflowDefinition};
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

/// What a dispatched unit reports back when it finishes.
struct Finished {
  task_id: String,
  compensation_for: Option<String>,
  status: TaskStatus,
}

pub(crate) struct Scheduler {
  definition: Arc<WorkflowDefinition>,
  executor: TaskExecutor,
  evaluator: ConditionEvaluator,
  /// Cancelled by `cancel_workflow`, engine shutdown or the global timeout.
  cancel: CancellationToken,
  /// Child of `cancel`; additionally cancelled by a fail-fast abort.
  tasks_cancel: CancellationToken,
  compensation_only: HashSet<String>,
  /// Failed tasks whose compensation has been scheduled.
  compensated: HashSet<String>,
  in_flight: JoinSet<Finished>,
  groups_dispatched: usize,
}

impl Scheduler {
  pub(crate) fn new(definition: Arc<WorkflowDefinition>, executor: TaskExecutor, cancel: CancellationToken) -> Self {
    let compensation_only = graph::compensation_only(&definition)
      .into_iter()
      .map(str::to_string)
      .collect();
    let tasks_cancel = cancel.child_token();
    Self {
      definition,
      executor,
      evaluator: ConditionEvaluator,
      cancel,
      tasks_cancel,
      compensation_only,
      compensated: HashSet::new(),
      in_flight: JoinSet::new(),
      groups_dispatched: 0,
    }
  }

  /// Runs the execution until it reaches a terminal status. The terminal
  /// snapshot is published by the caller.
  #[instrument(
    name = "Scheduler::drive",
    skip_all,
    fields(execution_id = %self.executor.execution_id(), workflow_id = %self.definition.workflow_id())
  )]
  pub(crate) async fn drive(mut self) {
    if !self.executor.state().with(|exec| exec.mark_running()) {
      event!(Level::INFO, "Execution was cancelled before it started.");
      return;
    }
    self.executor.hooks().emit(ExecutionEvent::WorkflowStarted {
      execution_id: self.executor.execution_id(),
      workflow_id: self.definition.workflow_id().to_string(),
    });

    let global_timeout = self.definition.global_timeout();
    let deadline = async move {
      match global_timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
      }
    };
    tokio::pin!(deadline);

    self.dispatch_ready();
    while !self.in_flight.is_empty() {
      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => {
          self.interrupt("workflow cancelled").await;
          return;
        }
        _ = &mut deadline => {
          let reason = format!("workflow timed out after {:?}", global_timeout.unwrap_or_default());
          event!(Level::WARN, %reason, "Global timeout elapsed.");
          self.interrupt(&reason).await;
          return;
        }
        joined = self.in_flight.join_next() => {
          let Some(joined) = joined else { break };
          let finished = match joined {
            Ok(finished) => finished,
            Err(join_err) => {
              event!(Level::ERROR, error = %join_err, "Dispatched task unit was lost.");
              continue;
            }
          };
          if self.on_finished(finished).await {
            return;
          }
          self.dispatch_ready();
        }
      }
    }

    self.finalize();
  }

  /// Applies the workflow's error-handling strategy to one finished unit.
  /// Returns true when the execution was aborted.
  async fn on_finished(&mut self, finished: Finished) -> bool {
    if let Some(for_task) = finished.compensation_for {
      event!(Level::INFO, task_id = %finished.task_id, %for_task, status = %finished.status, "Compensation finished.");
      self.executor.hooks().emit(ExecutionEvent::CompensationFinished {
        execution_id: self.executor.execution_id(),
        task_id: finished.task_id,
        for_task,
        status: finished.status,
      });
      return false;
    }

    if finished.status != TaskStatus::Failed {
      return false;
    }

    let strategy = self.definition.error_handling();
    if strategy.aborts_on_failure() {
      let error = self
        .executor
        .state()
        .with(|exec| exec.task_result(&finished.task_id).and_then(|r| r.error.clone()))
        .unwrap_or_default();
      event!(Level::WARN, task_id = %finished.task_id, "Fail-fast: aborting remaining tasks.");
      self.tasks_cancel.cancel();
      self.drain().await;
      self.executor.state().with(|exec| {
        exec.finish(
          WorkflowStatus::Failed,
          Some(format!("task '{}' failed: {}", finished.task_id, error)),
        )
      });
      return true;
    }

    if strategy.compensates() {
      self.compensate(&finished.task_id);
    }
    false
  }

  /// Schedules the compensation of a failed task, at most once per failure.
  fn compensate(&mut self, failed_task: &str) {
    let Some(compensation_id) = self.definition.task(failed_task).and_then(|t| t.compensate_with()) else {
      return;
    };
    if !self.compensated.insert(failed_task.to_string()) {
      return;
    }
    let Some(compensation) = self.definition.task(compensation_id).cloned() else {
      return;
    };
    event!(Level::WARN, task_id = %compensation_id, for_task = %failed_task, "Scheduling compensation.");
    if !self.executor.begin(&compensation, Some(failed_task)) {
      return;
    }
    self.executor.hooks().emit(ExecutionEvent::CompensationStarted {
      execution_id: self.executor.execution_id(),
      task_id: compensation_id.to_string(),
      for_task: failed_task.to_string(),
    });
    self.spawn(compensation, Some(failed_task.to_string()));
  }

  /// Computes the ready frontier, records condition skips and dispatches the
  /// rest grouped by dependency set.
  fn dispatch_ready(&mut self) {
    let definition = Arc::clone(&self.definition);
    let mut skipped = Vec::new();
    let ready: Vec<&TaskDefinition> = self.executor.state().with(|exec| {
      let mut ready = Vec::new();
      for task in definition.tasks() {
        let task_id = task.task_id();
        if self.compensation_only.contains(task_id) || exec.task_result(task_id).is_some() {
          continue;
        }
        if !task.depends_on().iter().all(|dep| exec.is_task_completed(dep)) {
          continue;
        }
        match task.condition() {
          Some(condition) if !self.evaluator.evaluate(condition, &exec.context) => {
            if exec.record_task(TaskResult::skipped(task_id)) {
              skipped.push(task_id.to_string());
            }
          }
          _ => ready.push(task),
        }
      }
      ready
    });

    for task_id in skipped {
      event!(Level::INFO, %task_id, "Condition not met; task skipped.");
      self.executor.hooks().emit(ExecutionEvent::TaskSkipped {
        execution_id: self.executor.execution_id(),
        task_id,
      });
    }

    for group in graph::parallel_groups(&ready) {
      self.groups_dispatched += 1;
      let task_ids: Vec<&str> = group.iter().map(|t| t.task_id()).collect();
      event!(Level::DEBUG, group = self.groups_dispatched, tasks = ?task_ids, "Dispatching parallel group.");
      for task in group {
        if !self.executor.begin(task, None) {
          return;
        }
        self.spawn(task.clone(), None);
      }
    }
  }

  fn spawn(&mut self, task: TaskDefinition, compensation_for: Option<String>) {
    let executor = self.executor.clone();
    let cancel = self.tasks_cancel.clone();
    self.in_flight.spawn(async move {
      let task_id = task.task_id().to_string();
      let run = executor.run(task, compensation_for.clone(), cancel);
      let status = match AssertUnwindSafe(run).catch_unwind().await {
        Ok(status) => status,
        Err(_) => executor.fail_panicked(&task_id),
      };
      Finished {
        task_id,
        compensation_for,
        status,
      }
    });
  }

  /// Forces the execution to Cancelled and waits for in-flight units to
  /// observe it.
  async fn interrupt(&mut self, reason: &str) {
    if let Some(interrupted) = self.executor.state().with(|exec| exec.cancel(reason)) {
      event!(Level::WARN, %reason, tasks = ?interrupted, "Execution cancelled.");
    }
    self.cancel.cancel();
    self.drain().await;
  }

  async fn drain(&mut self) {
    while let Some(joined) = self.in_flight.join_next().await {
      if let Err(join_err) = joined {
        event!(Level::ERROR, error = %join_err, "Dispatched task unit was lost while draining.");
      }
    }
  }

  /// Decides Completed or Failed once nothing is in flight.
  fn finalize(&self) {
    let definition = &self.definition;
    let compensation_only = &self.compensation_only;
    self.executor.state().with(|exec| {
      let mut failed = Vec::new();
      let mut unreached = Vec::new();
      for task in definition.tasks() {
        let task_id = task.task_id();
        if compensation_only.contains(task_id) {
          continue;
        }
        match exec.task_status(task_id) {
          Some(status) if status.is_successful() => {}
          Some(_) => failed.push(task_id),
          None => unreached.push(task_id),
        }
      }

      let (status, error) = if !failed.is_empty() {
        (WorkflowStatus::Failed, Some(format!("tasks failed: [{}]", failed.join(", "))))
      } else if !unreached.is_empty() {
        (
          WorkflowStatus::Failed,
          Some(format!("workflow stalled: unreachable tasks [{}]", unreached.join(", "))),
        )
      } else {
        (WorkflowStatus::Completed, None)
      };
      event!(Level::INFO, %status, error = ?error, "Execution finished.");
      exec.finish(status, error);
    });
  }
}
