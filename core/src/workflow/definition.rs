// conductor/src/workflow/definition.rs

//! Contains the `WorkflowDefinition` struct: a reusable, read-only template
//! describing a task graph, and its builder.

use crate::core::control::ErrorHandling;
use crate::core::serde_duration;
use crate::error::{ConductorError, ConductorResult};
use crate::workflow::graph;
use crate::workflow::task::TaskDefinition;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A declared graph of tasks plus the policies governing its execution.
///
/// One definition may back any number of concurrent executions; the engine
/// only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
  workflow_id: String,
  #[serde(default)]
  name: String,
  #[serde(default)]
  tasks: Vec<TaskDefinition>,
  #[serde(default, with = "serde_duration::option", skip_serializing_if = "Option::is_none")]
  global_timeout: Option<Duration>,
  #[serde(default)]
  error_handling: ErrorHandling,
}

impl WorkflowDefinition {
  pub fn builder(workflow_id: impl Into<String>, name: impl Into<String>) -> WorkflowBuilder {
    WorkflowBuilder {
      definition: WorkflowDefinition {
        workflow_id: workflow_id.into(),
        name: name.into(),
        tasks: Vec::new(),
        global_timeout: None,
        error_handling: ErrorHandling::default(),
      },
    }
  }

  /// Parses a JSON definition and validates it.
  pub fn from_json(json: &str) -> ConductorResult<Self> {
    let definition: WorkflowDefinition =
      serde_json::from_str(json).map_err(|e| ConductorError::InvalidDefinition {
        workflow_id: "<unparsed>".to_string(),
        message: format!("malformed JSON definition: {}", e),
      })?;
    definition.validate()?;
    Ok(definition)
  }

  pub fn to_json(&self) -> ConductorResult<String> {
    serde_json::to_string_pretty(self).map_err(|e| ConductorError::Internal(e.to_string()))
  }

  /// Checks structural soundness: unique ids, known dependencies and
  /// compensations, parsable conditions and an acyclic dependency graph.
  pub fn validate(&self) -> ConductorResult<()> {
    graph::validate(self)
  }

  pub fn workflow_id(&self) -> &str {
    &self.workflow_id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Tasks in authoring order. Order carries no scheduling meaning.
  pub fn tasks(&self) -> &[TaskDefinition] {
    &self.tasks
  }

  pub fn task(&self, task_id: &str) -> Option<&TaskDefinition> {
    self.tasks.iter().find(|t| t.task_id() == task_id)
  }

  pub fn global_timeout(&self) -> Option<Duration> {
    self.global_timeout
  }

  pub fn error_handling(&self) -> ErrorHandling {
    self.error_handling
  }
}

/// Fluent builder for [`WorkflowDefinition`]; `build` validates.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
  definition: WorkflowDefinition,
}

impl WorkflowBuilder {
  pub fn task(mut self, task: impl Into<TaskDefinition>) -> Self {
    self.definition.tasks.push(task.into());
    self
  }

  pub fn tasks<I, T>(mut self, tasks: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Into<TaskDefinition>,
  {
    self.definition.tasks.extend(tasks.into_iter().map(Into::into));
    self
  }

  pub fn global_timeout(mut self, timeout: Duration) -> Self {
    self.definition.global_timeout = Some(timeout);
    self
  }

  pub fn error_handling(mut self, strategy: ErrorHandling) -> Self {
    self.definition.error_handling = strategy;
    self
  }

  pub fn build(self) -> ConductorResult<WorkflowDefinition> {
    self.definition.validate()?;
    Ok(self.definition)
  }
}
