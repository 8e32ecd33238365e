// conductor/src/engine/config.rs

use crate::core::serde_duration;
use crate::error::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Engine-wide execution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Applied to each invocation of a task that declares no timeout of its own.
  #[serde(with = "serde_duration::option")]
  pub default_task_timeout: Option<Duration>,

  /// Cap on concurrently running service invocations within one execution.
  pub max_concurrent_tasks: Option<usize>,

  /// Bound for compensation tasks that declare no timeout of their own.
  #[serde(with = "serde_duration::option")]
  pub compensation_timeout: Option<Duration>,
}

impl EngineConfig {
  /// Reads settings from `CONDUCTOR_*` environment variables. Unset variables
  /// keep their defaults; unparsable ones are an error.
  pub fn from_env() -> ConductorResult<Self> {
    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());

    let parse_millis = |var_name: &str| -> ConductorResult<Option<Duration>> {
      get_env(var_name)
        .map(|raw| {
          raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConductorError::Config(format!("Invalid {}: {}", var_name, e)))
        })
        .transpose()
    };

    let default_task_timeout = parse_millis("CONDUCTOR_DEFAULT_TASK_TIMEOUT_MS")?;
    let compensation_timeout = parse_millis("CONDUCTOR_COMPENSATION_TIMEOUT_MS")?;
    let max_concurrent_tasks = get_env("CONDUCTOR_MAX_CONCURRENT_TASKS")
      .map(|raw| {
        raw
          .trim()
          .parse::<usize>()
          .map_err(|e| ConductorError::Config(format!("Invalid CONDUCTOR_MAX_CONCURRENT_TASKS: {}", e)))
      })
      .transpose()?;

    let config = Self {
      default_task_timeout,
      max_concurrent_tasks,
      compensation_timeout,
    };
    config.check()?;
    tracing::debug!(?config, "Engine configuration loaded from environment.");
    Ok(config)
  }

  pub fn with_default_task_timeout(mut self, timeout: Duration) -> Self {
    self.default_task_timeout = Some(timeout);
    self
  }

  pub fn with_max_concurrent_tasks(mut self, limit: usize) -> Self {
    self.max_concurrent_tasks = Some(limit);
    self
  }

  pub fn with_compensation_timeout(mut self, timeout: Duration) -> Self {
    self.compensation_timeout = Some(timeout);
    self
  }

  pub(crate) fn check(&self) -> ConductorResult<()> {
    if self.max_concurrent_tasks == Some(0) {
      return Err(ConductorError::Config(
        "max_concurrent_tasks must be at least 1".to_string(),
      ));
    }
    Ok(())
  }
}
