// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use conductor::{Context, Engine, Params, Service, ServiceRegistry, Value, WorkflowExecution};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

// --- What a mock service should do when called ---
#[derive(Clone, Debug)]
pub enum Behavior {
  /// Returns `{ "<method>_done": true }`.
  Succeed,
  /// Returns the given value.
  Return(Value),
  /// Fails every time with the given message.
  Fail(String),
  /// Fails the first `n` calls, then returns the value.
  FailTimes(usize, Value),
  /// Sleeps, then returns the value.
  Sleep(Duration, Value),
  Panic,
}

#[derive(Clone, Debug)]
pub struct Call {
  pub method: String,
  pub params: Params,
  pub context: Context,
  pub started_at: tokio::time::Instant,
  pub finished_at: Option<tokio::time::Instant>,
}

/// A programmable service recording every invocation. Behaviour is chosen
/// per method; unknown methods succeed.
pub struct MockService {
  name: String,
  behaviors: Mutex<std::collections::HashMap<String, Behavior>>,
  calls: Arc<Mutex<Vec<Call>>>,
  attempts: AtomicUsize,
  healthy: bool,
}

impl MockService {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      behaviors: Mutex::new(Default::default()),
      calls: Arc::new(Mutex::new(Vec::new())),
      attempts: AtomicUsize::new(0),
      healthy: true,
    }
  }

  pub fn unhealthy(mut self) -> Self {
    self.healthy = false;
    self
  }

  pub fn on(self, method: &str, behavior: Behavior) -> Self {
    self.behaviors.lock().insert(method.to_string(), behavior);
    self
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().clone()
  }

  pub fn methods_called(&self) -> Vec<String> {
    self.calls.lock().iter().map(|c| c.method.clone()).collect()
  }

  pub fn count(&self, method: &str) -> usize {
    self.calls.lock().iter().filter(|c| c.method == method).count()
  }

  pub fn call(&self, method: &str) -> Option<Call> {
    self.calls.lock().iter().find(|c| c.method == method).cloned()
  }

  pub fn attempts(&self) -> usize {
    self.attempts.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Service for MockService {
  async fn execute(&self, method: &str, params: &Params, context: &Context) -> anyhow::Result<Value> {
    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
    let index = {
      let mut calls = self.calls.lock();
      calls.push(Call {
        method: method.to_string(),
        params: params.clone(),
        context: context.clone(),
        started_at: tokio::time::Instant::now(),
        finished_at: None,
      });
      calls.len() - 1
    };
    tracing::debug!(target: "test_services", service = %self.name, %method, attempt, "mock invoked");

    let behavior = self.behaviors.lock().get(method).cloned().unwrap_or(Behavior::Succeed);
    let outcome = match behavior {
      Behavior::Succeed => {
        let mut done = serde_json::Map::new();
        done.insert(format!("{}_done", method), Value::Bool(true));
        Ok(Value::Object(done))
      }
      Behavior::Return(value) => Ok(value),
      Behavior::Fail(message) => Err(anyhow::anyhow!(message)),
      Behavior::FailTimes(n, value) => {
        let failures_so_far = self.calls.lock().iter().filter(|c| c.method == method).count() - 1;
        if failures_so_far < n {
          Err(anyhow::anyhow!("transient failure #{}", failures_so_far + 1))
        } else {
          Ok(value)
        }
      }
      Behavior::Sleep(delay, value) => {
        tokio::time::sleep(delay).await;
        Ok(value)
      }
      Behavior::Panic => panic!("mock service panicked on purpose"),
    };

    self.calls.lock()[index].finished_at = Some(tokio::time::Instant::now());
    outcome
  }

  async fn health_check(&self) -> anyhow::Result<()> {
    if self.healthy {
      Ok(())
    } else {
      Err(anyhow::anyhow!("{} is down", self.name))
    }
  }

  fn name(&self) -> &str {
    &self.name
  }
}

// --- Engine setup helpers ---

/// Registers each mock under its own name and builds an engine over them.
pub fn engine_with(services: &[Arc<MockService>]) -> Engine {
  Engine::new(registry_with(services))
}

pub fn registry_with(services: &[Arc<MockService>]) -> Arc<ServiceRegistry> {
  let registry = Arc::new(ServiceRegistry::new());
  for service in services {
    registry.register_arc(service.name().to_string(), service.clone() as Arc<dyn Service>);
  }
  registry
}

pub fn ctx(pairs: &[(&str, Value)]) -> Context {
  pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Waits for the execution to finish, failing the test if it takes longer
/// than a minute of (possibly paused) runtime time.
pub async fn finish(engine: &Engine, execution_id: Uuid) -> WorkflowExecution {
  tokio::time::timeout(Duration::from_secs(60), engine.wait(execution_id))
    .await
    .expect("execution did not finish in time")
    .expect("execution should exist")
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
