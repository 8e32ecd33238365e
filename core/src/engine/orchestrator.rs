// conductor/src/engine/orchestrator.rs

//! The `Engine`: owns the executions it started and the cancellation tree
//! that reaches every one of them.

use crate::core::shared::Shared;
use crate::core::status::WorkflowStatus;
use crate::core::value::Context;
use crate::engine::config::EngineConfig;
use crate::engine::execution::WorkflowExecution;
use crate::engine::executor::TaskExecutor;
use crate::engine::hooks::{ExecutionEvent, ExecutionHook, Hooks};
use crate::engine::scheduler::Scheduler;
use crate::error::{ConductorError, ConductorResult};
use crate::registry::ServiceRegistry;
use crate::workflow::WorkflowDefinition;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// Everything the engine keeps about one execution.
#[derive(Clone)]
struct ExecutionHandle {
  state: Shared<WorkflowExecution>,
  cancel: CancellationToken,
  /// Flips to true once the scheduler has exited and the snapshot is final.
  done: watch::Receiver<bool>,
}

/// Runs workflow definitions against a [`ServiceRegistry`].
///
/// Each engine owns its own execution store; engines never share state
/// beyond the registry they were given. Executions are retained after they
/// finish until [`Engine::discard`] is called.
pub struct Engine {
  registry: Arc<ServiceRegistry>,
  config: EngineConfig,
  hooks: Hooks,
  root: CancellationToken,
  executions: RwLock<HashMap<Uuid, ExecutionHandle>>,
}

impl Engine {
  pub fn new(registry: Arc<ServiceRegistry>) -> Self {
    Self {
      registry,
      config: EngineConfig::default(),
      hooks: Hooks::default(),
      root: CancellationToken::new(),
      executions: RwLock::new(HashMap::new()),
    }
  }

  pub fn with_config(registry: Arc<ServiceRegistry>, config: EngineConfig) -> ConductorResult<Self> {
    config.check()?;
    let mut engine = Self::new(registry);
    engine.config = config;
    Ok(engine)
  }

  /// Attaches an observability hook. Hooks see every execution started after
  /// they were added.
  pub fn with_hook<H>(mut self, hook: H) -> Self
  where
    H: ExecutionHook + 'static,
  {
    self.hooks = self.hooks.with(Arc::new(hook));
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn registry(&self) -> &Arc<ServiceRegistry> {
    &self.registry
  }

  /// Validates `definition`, starts its scheduling loop in the background
  /// and returns the new execution's id immediately.
  ///
  /// Must be called from within a Tokio runtime. Failures of the run itself
  /// are only observable through [`Engine::get_execution_status`],
  /// [`Engine::wait`] or hooks.
  #[instrument(name = "Engine::execute_workflow", skip_all, fields(workflow_id = tracing::field::Empty, execution_id = tracing::field::Empty))]
  pub fn execute_workflow(
    &self,
    definition: impl Into<Arc<WorkflowDefinition>>,
    initial_context: Context,
  ) -> ConductorResult<Uuid> {
    let definition: Arc<WorkflowDefinition> = definition.into();
    let task_count = definition.tasks().len();
    let span = tracing::Span::current();
    span.record("workflow_id", definition.workflow_id());

    definition.validate()?;
    let runtime = Handle::try_current()
      .map_err(|e| ConductorError::Internal(format!("execute_workflow requires a Tokio runtime: {}", e)))?;
    if self.root.is_cancelled() {
      return Err(ConductorError::Internal("engine has been shut down".to_string()));
    }

    let execution_id = Uuid::new_v4();
    span.record("execution_id", tracing::field::display(execution_id));

    let state = Shared::new(WorkflowExecution::new(
      execution_id,
      Arc::clone(&definition),
      initial_context,
    ));
    let cancel = self.root.child_token();
    let (done_tx, done_rx) = watch::channel(false);
    let executor = TaskExecutor::new(
      execution_id,
      state.clone(),
      Arc::clone(&self.registry),
      self.hooks.clone(),
      &self.config,
    );
    let scheduler = Scheduler::new(definition, executor, cancel.clone());

    self.executions.write().insert(
      execution_id,
      ExecutionHandle {
        state: state.clone(),
        cancel,
        done: done_rx,
      },
    );
    event!(Level::INFO, tasks = task_count, "Workflow execution submitted.");

    runtime.spawn(run_to_completion(scheduler, state, self.hooks.clone(), done_tx));
    Ok(execution_id)
  }

  /// Snapshot of an execution. Safe to call while it runs.
  pub fn get_execution_status(&self, execution_id: Uuid) -> Option<WorkflowExecution> {
    self.handle(execution_id).map(|h| h.state.snapshot())
  }

  /// Cancels a Created or Running execution. In-flight tasks are marked
  /// Cancelled immediately and signalled to stop. Returns false if the
  /// execution is unknown or already terminal.
  #[instrument(name = "Engine::cancel_workflow", skip(self))]
  pub fn cancel_workflow(&self, execution_id: Uuid) -> bool {
    let Some(handle) = self.handle(execution_id) else {
      event!(Level::DEBUG, "Cancel requested for unknown execution.");
      return false;
    };
    match handle.state.with(|exec| exec.cancel("workflow cancelled")) {
      Some(interrupted) => {
        event!(Level::INFO, tasks = ?interrupted, "Execution cancelled.");
        handle.cancel.cancel();
        true
      }
      None => false,
    }
  }

  /// Waits until the execution's scheduling loop has exited and returns the
  /// final snapshot. `None` if the execution is unknown.
  pub async fn wait(&self, execution_id: Uuid) -> Option<WorkflowExecution> {
    let handle = self.handle(execution_id)?;
    let mut done = handle.done.clone();
    // An error means the sender is gone, which only happens after it published.
    let _ = done.wait_for(|finished| *finished).await;
    Some(handle.state.snapshot())
  }

  /// Drops a terminal execution from the store. Returns false if it is
  /// unknown or still running.
  pub fn discard(&self, execution_id: Uuid) -> bool {
    let mut executions = self.executions.write();
    let finished = executions
      .get(&execution_id)
      .is_some_and(|h| h.state.with(|exec| exec.is_terminal()) && *h.done.borrow());
    if finished {
      executions.remove(&execution_id);
    }
    finished
  }

  /// Ids and current statuses of every retained execution.
  pub fn list_executions(&self) -> Vec<(Uuid, WorkflowStatus)> {
    let executions = self.executions.read();
    let mut listed: Vec<_> = executions
      .iter()
      .map(|(id, handle)| (*id, handle.state.with(|exec| exec.status)))
      .collect();
    listed.sort_by_key(|(id, _)| *id);
    listed
  }

  /// Cancels every execution still in flight, waits for their scheduling
  /// loops to exit and refuses new submissions from then on.
  #[instrument(name = "Engine::shutdown", skip_all)]
  pub async fn shutdown(&self) {
    event!(Level::INFO, "Shutting down engine.");
    self.root.cancel();
    let pending: Vec<Uuid> = self.executions.read().keys().copied().collect();
    for execution_id in pending {
      self.wait(execution_id).await;
    }
  }

  fn handle(&self, execution_id: Uuid) -> Option<ExecutionHandle> {
    self.executions.read().get(&execution_id).cloned()
  }
}

impl Drop for Engine {
  fn drop(&mut self) {
    self.root.cancel();
  }
}

impl std::fmt::Debug for Engine {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Engine")
      .field("config", &self.config)
      .field("hooks", &self.hooks.len())
      .field("executions", &self.executions.read().len())
      .finish()
  }
}

/// Drives the scheduler, contains a scheduler panic, then publishes the
/// terminal snapshot to hooks and waiters.
async fn run_to_completion(
  scheduler: Scheduler,
  state: Shared<WorkflowExecution>,
  hooks: Hooks,
  done: watch::Sender<bool>,
) {
  if AssertUnwindSafe(scheduler.drive()).catch_unwind().await.is_err() {
    event!(Level::ERROR, "Scheduler panicked.");
    state.with(|exec| exec.finish(WorkflowStatus::Failed, Some("scheduler panicked".to_string())));
  }

  let (execution_id, workflow_id, status, error) = state.with(|exec| {
    if !exec.is_terminal() {
      event!(Level::ERROR, execution_id = %exec.execution_id, "Scheduler exited without a terminal status.");
      exec.finish(WorkflowStatus::Failed, Some("scheduler exited early".to_string()));
    }
    (
      exec.execution_id,
      exec.workflow_id.clone(),
      exec.status,
      exec.error.clone(),
    )
  });
  hooks.emit(ExecutionEvent::WorkflowFinished {
    execution_id,
    workflow_id,
    status,
    error,
  });
  done.send_replace(true);
}
