// conductor/src/workflow/task.rs

//! Defines a single task within a workflow: which service it calls, how it is
//! retried and bounded, what it waits for and what undoes it.

use crate::core::serde_duration;
use crate::core::value::{Params, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// How the delay between retry attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Backoff {
  /// Every retry waits exactly `retry_delay`.
  #[default]
  Fixed,
  /// Retry `n` waits `retry_delay * multiplier^(n-1)`, capped at `max_delay`.
  Exponential {
    multiplier: f64,
    #[serde(with = "serde_duration")]
    max_delay: Duration,
  },
}

impl Backoff {
  /// Delay before retry number `retry` (1-based).
  pub fn delay_for(&self, base: Duration, retry: u32) -> Duration {
    match *self {
      Backoff::Fixed => base,
      Backoff::Exponential { multiplier, max_delay } => {
        let exponent = retry.saturating_sub(1) as i32;
        let millis = base.as_millis() as f64 * multiplier.max(1.0).powi(exponent);
        Duration::from_millis(millis.min(max_delay.as_millis() as f64) as u64)
      }
    }
  }
}

/// Declarative description of one task. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
  task_id: String,
  #[serde(default)]
  name: String,
  service_name: String,
  method: String,
  #[serde(default)]
  parameters: Params,
  #[serde(default, with = "serde_duration::option", skip_serializing_if = "Option::is_none")]
  timeout: Option<Duration>,
  #[serde(default)]
  retry_count: u32,
  #[serde(default, with = "serde_duration")]
  retry_delay: Duration,
  #[serde(default)]
  backoff: Backoff,
  #[serde(default)]
  depends_on: BTreeSet<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  condition: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  compensate_with: Option<String>,
}

impl TaskDefinition {
  /// Starts a builder for a task calling `method` on `service_name`.
  pub fn builder(
    task_id: impl Into<String>,
    service_name: impl Into<String>,
    method: impl Into<String>,
  ) -> TaskBuilder {
    let task_id = task_id.into();
    TaskBuilder {
      task: TaskDefinition {
        name: task_id.clone(),
        task_id,
        service_name: service_name.into(),
        method: method.into(),
        parameters: Params::new(),
        timeout: None,
        retry_count: 0,
        retry_delay: Duration::ZERO,
        backoff: Backoff::Fixed,
        depends_on: BTreeSet::new(),
        condition: None,
        compensate_with: None,
      },
    }
  }

  pub fn task_id(&self) -> &str {
    &self.task_id
  }

  /// Display name; falls back to the task id when none was given.
  pub fn name(&self) -> &str {
    if self.name.is_empty() {
      &self.task_id
    } else {
      &self.name
    }
  }

  pub fn service_name(&self) -> &str {
    &self.service_name
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn parameters(&self) -> &Params {
    &self.parameters
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  pub fn retry_count(&self) -> u32 {
    self.retry_count
  }

  pub fn retry_delay(&self) -> Duration {
    self.retry_delay
  }

  pub fn backoff(&self) -> Backoff {
    self.backoff
  }

  pub fn depends_on(&self) -> &BTreeSet<String> {
    &self.depends_on
  }

  pub fn condition(&self) -> Option<&str> {
    self.condition.as_deref()
  }

  pub fn compensate_with(&self) -> Option<&str> {
    self.compensate_with.as_deref()
  }
}

/// Fluent builder for [`TaskDefinition`].
#[derive(Debug, Clone)]
pub struct TaskBuilder {
  task: TaskDefinition,
}

impl TaskBuilder {
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.task.name = name.into();
    self
  }

  pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.task.parameters.insert(key.into(), value.into());
    self
  }

  pub fn params(mut self, params: Params) -> Self {
    self.task.parameters.extend(params);
    self
  }

  /// Bounds each individual service invocation, retries included.
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.task.timeout = Some(timeout);
    self
  }

  /// Allows `count` retries after the first attempt, waiting `delay` between them.
  pub fn retries(mut self, count: u32, delay: Duration) -> Self {
    self.task.retry_count = count;
    self.task.retry_delay = delay;
    self
  }

  pub fn backoff(mut self, backoff: Backoff) -> Self {
    self.task.backoff = backoff;
    self
  }

  pub fn depends_on(mut self, task_id: impl Into<String>) -> Self {
    self.task.depends_on.insert(task_id.into());
    self
  }

  pub fn depends_on_all<I, S>(mut self, task_ids: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.task.depends_on.extend(task_ids.into_iter().map(Into::into));
    self
  }

  pub fn condition(mut self, condition: impl Into<String>) -> Self {
    self.task.condition = Some(condition.into());
    self
  }

  pub fn compensate_with(mut self, task_id: impl Into<String>) -> Self {
    self.task.compensate_with = Some(task_id.into());
    self
  }

  pub fn build(self) -> TaskDefinition {
    self.task
  }
}

impl From<TaskBuilder> for TaskDefinition {
  fn from(builder: TaskBuilder) -> Self {
    builder.build()
  }
}
