// conductor/src/registry.rs

//! Defines the `Service` contract the engine dispatches tasks to, and the
//! name-keyed `ServiceRegistry` that resolves `service_name` to a provider.
//!
//! The registry is owned by the caller and shared with one or more engines;
//! there is no process-wide instance.

use crate::core::value::{Context, Params, Value};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{event, instrument, Level};

/// A downstream capability provider.
///
/// This is the entire surface the engine needs from business logic; how a
/// service reaches its backend is its own concern.
#[async_trait]
pub trait Service: Send + Sync {
  /// Executes `method` with the task's parameters and a snapshot of the
  /// execution context. Errors are retried by the engine per task policy.
  async fn execute(&self, method: &str, params: &Params, context: &Context) -> anyhow::Result<Value>;

  async fn health_check(&self) -> anyhow::Result<()> {
    Ok(())
  }

  fn name(&self) -> &str;
}

/// Adapts an async closure into a [`Service`].
///
/// The closure receives owned copies of the method, parameters and context so
/// the returned future can be `'static`.
pub struct FnService<F> {
  name: String,
  handler: F,
}

impl<F, Fut> FnService<F>
where
  F: Fn(String, Params, Context) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
  pub fn new(name: impl Into<String>, handler: F) -> Self {
    Self {
      name: name.into(),
      handler,
    }
  }
}

#[async_trait]
impl<F, Fut> Service for FnService<F>
where
  F: Fn(String, Params, Context) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
  async fn execute(&self, method: &str, params: &Params, context: &Context) -> anyhow::Result<Value> {
    (self.handler)(method.to_string(), params.clone(), context.clone()).await
  }

  fn name(&self) -> &str {
    &self.name
  }
}

/// Name-keyed lookup of services.
#[derive(Default)]
pub struct ServiceRegistry {
  services: RwLock<HashMap<String, Arc<dyn Service>>>,
}

impl ServiceRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `service` under `name`, returning any service it replaced.
  pub fn register<S>(&self, name: impl Into<String>, service: S) -> Option<Arc<dyn Service>>
  where
    S: Service + 'static,
  {
    self.register_arc(name, Arc::new(service))
  }

  pub fn register_arc(&self, name: impl Into<String>, service: Arc<dyn Service>) -> Option<Arc<dyn Service>> {
    let name = name.into();
    event!(Level::DEBUG, service_name = %name, provider = %service.name(), "Registering service.");
    let previous = self.services.write().insert(name.clone(), service);
    if previous.is_some() {
      event!(Level::WARN, service_name = %name, "Replaced an already registered service.");
    }
    previous
  }

  pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
    self.services.read().get(name).cloned()
  }

  pub fn unregister(&self, name: &str) -> Option<Arc<dyn Service>> {
    self.services.write().remove(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.services.read().contains_key(name)
  }

  /// Registered names, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.services.read().keys().cloned().collect();
    names.sort();
    names
  }

  pub fn len(&self) -> usize {
    self.services.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.services.read().is_empty()
  }

  /// Runs every service's health check concurrently. Results are keyed by
  /// registered name; a check that panics is logged and left out.
  #[instrument(name = "ServiceRegistry::health_check_all", skip_all, fields(services = self.len()))]
  pub async fn health_check_all(&self) -> HashMap<String, anyhow::Result<()>> {
    let snapshot: Vec<(String, Arc<dyn Service>)> = self
      .services
      .read()
      .iter()
      .map(|(name, service)| (name.clone(), service.clone()))
      .collect();

    let mut checks = JoinSet::new();
    for (name, service) in snapshot {
      checks.spawn(async move {
        let outcome = service.health_check().await;
        (name, outcome)
      });
    }

    let mut report = HashMap::new();
    while let Some(joined) = checks.join_next().await {
      match joined {
        Ok((name, outcome)) => {
          if let Err(e) = &outcome {
            event!(Level::WARN, service_name = %name, error = %e, "Service health check failed.");
          }
          report.insert(name, outcome);
        }
        Err(join_err) => {
          event!(Level::ERROR, error = %join_err, "Service health check panicked.");
        }
      }
    }
    report
  }
}

impl std::fmt::Debug for ServiceRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ServiceRegistry").field("services", &self.names()).finish()
  }
}
