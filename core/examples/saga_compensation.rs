// conductor/examples/saga_compensation.rs

use conductor::{
  ChannelHook, ConductorError, Context, Engine, ErrorHandling, ExecutionEvent, FnService, ServiceRegistry,
  TaskDefinition, WorkflowDefinition,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), ConductorError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Saga Compensation Example ---");

  // Services can be plain async closures.
  let registry = Arc::new(ServiceRegistry::new());
  registry.register(
    "inventory",
    FnService::new("inventory", |method, params, _context| async move {
      match method.as_str() {
        "reserve" => {
          let sku = params.get("sku").cloned().unwrap_or_default();
          anyhow::bail!("insufficient stock for {}", sku)
        }
        "release" => Ok(json!({ "stock_released": true })),
        other => anyhow::bail!("unsupported method: {}", other),
      }
    }),
  );
  registry.register(
    "payment",
    FnService::new("payment", |method, _params, _context| async move {
      Ok::<_, anyhow::Error>(json!({ format!("{}_ok", method): true }))
    }),
  );

  // reserve_stock fails after one retry; release_stock runs as its compensation.
  let definition = WorkflowDefinition::builder("order_processing", "Order processing")
    .task(TaskDefinition::builder("authorize", "payment", "authorize"))
    .task(
      TaskDefinition::builder("reserve_stock", "inventory", "reserve")
        .param("sku", "sku-42")
        .retries(1, Duration::from_millis(100))
        .depends_on("authorize")
        .compensate_with("release_stock"),
    )
    .task(TaskDefinition::builder("release_stock", "inventory", "release"))
    .task(TaskDefinition::builder("capture", "payment", "capture").depends_on("reserve_stock"))
    .error_handling(ErrorHandling::Compensate)
    .build()?;

  let (hook, mut events) = ChannelHook::channel();
  let engine = Engine::new(registry).with_hook(hook);

  let listener = tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      match &event {
        ExecutionEvent::CompensationStarted { task_id, for_task, .. } => {
          warn!(%task_id, %for_task, "Compensating");
        }
        ExecutionEvent::WorkflowFinished { .. } => {
          info!(event = ?event, "Finished");
          break;
        }
        _ => info!(event = %serde_json::to_string(&event).unwrap_or_default(), "Event"),
      }
    }
  });

  let execution_id = engine.execute_workflow(definition, Context::new())?;
  let execution = engine
    .wait(execution_id)
    .await
    .ok_or(ConductorError::ExecutionNotFound { execution_id })?;
  let _ = listener.await;

  info!(status = %execution.status, error = ?execution.error, "Order workflow finished");
  if let Some(release) = execution.task_result("release_stock") {
    info!(status = %release.status, compensation_for = ?release.compensation_for, "Compensation result");
  }
  Ok(())
}
