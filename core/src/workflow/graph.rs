// conductor/src/workflow/graph.rs

//! Structural analysis of a workflow's dependency graph: validation, cycle
//! detection, compensation-only tasks and parallel grouping.

use crate::condition;
use crate::error::{ConductorError, ConductorResult};
use crate::workflow::definition::WorkflowDefinition;
use crate::workflow::task::TaskDefinition;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap, HashSet};

pub(crate) fn validate(definition: &WorkflowDefinition) -> ConductorResult<()> {
  let workflow_id = definition.workflow_id();
  if workflow_id.trim().is_empty() {
    return Err(ConductorError::InvalidDefinition {
      workflow_id: workflow_id.to_string(),
      message: "workflow_id must not be empty".to_string(),
    });
  }

  let mut seen = HashSet::new();
  for task in definition.tasks() {
    if task.task_id().trim().is_empty() {
      return Err(ConductorError::InvalidDefinition {
        workflow_id: workflow_id.to_string(),
        message: "task_id must not be empty".to_string(),
      });
    }
    if !seen.insert(task.task_id()) {
      return Err(ConductorError::DuplicateTask {
        workflow_id: workflow_id.to_string(),
        task_id: task.task_id().to_string(),
      });
    }
    if task.service_name().trim().is_empty() {
      return Err(ConductorError::InvalidDefinition {
        workflow_id: workflow_id.to_string(),
        message: format!("task '{}' has no service_name", task.task_id()),
      });
    }
  }

  let compensations = compensation_only(definition);
  // Each compensation records into its own TaskResult, so it serves one task.
  let mut compensated_by: HashMap<&str, &str> = HashMap::new();
  for task in definition.tasks() {
    for dependency in task.depends_on() {
      if !seen.contains(dependency.as_str()) {
        return Err(ConductorError::UnknownDependency {
          task_id: task.task_id().to_string(),
          dependency: dependency.clone(),
        });
      }
      if compensations.contains(dependency.as_str()) {
        return Err(ConductorError::InvalidDefinition {
          workflow_id: workflow_id.to_string(),
          message: format!(
            "task '{}' depends on '{}', which only runs as a compensation",
            task.task_id(),
            dependency
          ),
        });
      }
    }
    if let Some(compensation) = task.compensate_with() {
      if !seen.contains(compensation) {
        return Err(ConductorError::UnknownCompensation {
          task_id: task.task_id().to_string(),
          compensation: compensation.to_string(),
        });
      }
      if compensation == task.task_id() {
        return Err(ConductorError::InvalidDefinition {
          workflow_id: workflow_id.to_string(),
          message: format!("task '{}' cannot compensate itself", task.task_id()),
        });
      }
      if let Some(previous) = compensated_by.insert(compensation, task.task_id()) {
        return Err(ConductorError::InvalidDefinition {
          workflow_id: workflow_id.to_string(),
          message: format!(
            "tasks '{}' and '{}' both compensate with '{}'",
            previous,
            task.task_id(),
            compensation
          ),
        });
      }
    }
    if let Some(source) = task.condition() {
      condition::parse(source).map_err(|source| ConductorError::InvalidCondition {
        task_id: task.task_id().to_string(),
        source,
      })?;
    }
  }

  if let Some(task_id) = find_cycle(definition.tasks()) {
    return Err(ConductorError::DependencyCycle {
      workflow_id: workflow_id.to_string(),
      task_id,
    });
  }
  Ok(())
}

/// Builds the dependency graph (edges run from a dependency to its dependent)
/// and sorts it topologically; returns a task on a cycle if there is one.
fn find_cycle(tasks: &[TaskDefinition]) -> Option<String> {
  let mut graph = DiGraph::<&str, ()>::with_capacity(tasks.len(), tasks.len());
  let nodes: HashMap<&str, NodeIndex> = tasks
    .iter()
    .map(|t| (t.task_id(), graph.add_node(t.task_id())))
    .collect();

  for task in tasks {
    let dependent = nodes[task.task_id()];
    for dependency in task.depends_on() {
      if let Some(&from) = nodes.get(dependency.as_str()) {
        graph.add_edge(from, dependent, ());
      }
    }
  }

  toposort(&graph, None)
    .err()
    .map(|cycle| graph[cycle.node_id()].to_string())
}

/// Ids of tasks referenced by some `compensate_with`. They never take part in
/// ordinary readiness and only run as compensations.
pub fn compensation_only(definition: &WorkflowDefinition) -> HashSet<&str> {
  definition.tasks().iter().filter_map(|t| t.compensate_with()).collect()
}

/// Partitions ready tasks into groups sharing an identical `depends_on` set.
/// Groups keep the order in which their first member appears.
pub fn parallel_groups<'a>(ready: &[&'a TaskDefinition]) -> Vec<Vec<&'a TaskDefinition>> {
  let mut index: HashMap<&BTreeSet<String>, usize> = HashMap::new();
  let mut groups: Vec<Vec<&'a TaskDefinition>> = Vec::new();
  for &task in ready {
    let slot = *index.entry(task.depends_on()).or_insert_with(|| {
      groups.push(Vec::new());
      groups.len() - 1
    });
    groups[slot].push(task);
  }
  groups
}
