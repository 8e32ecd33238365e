// conductor/examples/basic_workflow.rs

use async_trait::async_trait;
use conductor::{
  ConductorError, Context, Engine, Params, Service, ServiceRegistry, TaskDefinition, TracingHook, Value,
  WorkflowDefinition,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// 1. Implement the Service contract for each downstream capability.
struct UserService;

#[async_trait]
impl Service for UserService {
  async fn execute(&self, method: &str, params: &Params, _context: &Context) -> anyhow::Result<Value> {
    match method {
      "create" => {
        let email = params.get("email").and_then(Value::as_str).unwrap_or("unknown@example.com");
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(json!({ "user_id": 1001, "email": email }))
      }
      other => anyhow::bail!("unsupported method: {}", other),
    }
  }

  fn name(&self) -> &str {
    "user-service"
  }
}

struct EmailService;

#[async_trait]
impl Service for EmailService {
  async fn execute(&self, method: &str, params: &Params, context: &Context) -> anyhow::Result<Value> {
    let to = context.get("email").cloned().unwrap_or(Value::Null);
    let template = params.get("template").cloned().unwrap_or(Value::Null);
    info!(%method, %to, %template, "Sending email");
    tokio::time::sleep(Duration::from_millis(20)).await;
    Ok(json!(true))
  }

  fn name(&self) -> &str {
    "email-service"
  }
}

#[tokio::main]
async fn main() -> Result<(), ConductorError> {
  // Initialize tracing (optional, for demonstration)
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Workflow Example ---");

  // 2. Register services by name.
  let registry = Arc::new(ServiceRegistry::new());
  registry.register("user", UserService);
  registry.register("email", EmailService);

  // 3. Describe the workflow: create the user, then send two emails in parallel.
  //    `analytics` only runs when the caller opted in.
  let definition = WorkflowDefinition::builder("user_onboarding", "User onboarding")
    .task(
      TaskDefinition::builder("create_user", "user", "create")
        .param("email", "ada@example.com")
        .timeout(Duration::from_secs(2))
        .retries(2, Duration::from_millis(200)),
    )
    .task(
      TaskDefinition::builder("welcome_email", "email", "send")
        .param("template", "welcome")
        .depends_on("create_user"),
    )
    .task(
      TaskDefinition::builder("tips_email", "email", "send")
        .param("template", "getting_started")
        .depends_on("create_user"),
    )
    .task(
      TaskDefinition::builder("analytics", "email", "track")
        .depends_on("create_user")
        .condition("tracking_opt_in == true"),
    )
    .global_timeout(Duration::from_secs(10))
    .build()?;

  // 4. Run it. execute_workflow returns immediately with the execution id.
  let engine = Engine::new(registry).with_hook(TracingHook);
  let execution_id = engine.execute_workflow(definition, Context::new())?;
  info!(%execution_id, "Workflow submitted");

  // 5. Wait for the terminal snapshot and inspect it.
  let execution = engine
    .wait(execution_id)
    .await
    .ok_or(ConductorError::ExecutionNotFound { execution_id })?;
  info!(status = %execution.status, "Workflow finished");

  let mut task_ids: Vec<_> = execution.task_results.keys().cloned().collect();
  task_ids.sort();
  for task_id in task_ids {
    let result = &execution.task_results[&task_id];
    info!(%task_id, status = %result.status, retries = result.retry_count, "Task result");
  }
  info!(context = ?execution.context, "Final context");
  Ok(())
}
