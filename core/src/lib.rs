// src/lib.rs

//! Conductor: an ASYNC, embeddable workflow orchestration engine for Rust.
//!
//! Conductor runs declarative workflows of service calls with features like:
//!  - Task graphs with `depends_on` edges, validated to be acyclic.
//!  - Parallel dispatch of tasks sharing an identical dependency set.
//!  - Per-task timeouts and retries with fixed or exponential backoff.
//!  - Condition expressions gating tasks on the shared execution context.
//!  - Fail-fast, continue and saga-style compensate error strategies.
//!  - Workflow-level timeout and cancellation reaching every in-flight task.
//!  - Observability hooks for every lifecycle transition.

pub mod condition;
pub mod core;
pub mod engine;
pub mod error;
pub mod registry;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::core::control::ErrorHandling;
pub use crate::core::status::{TaskStatus, WorkflowStatus};
pub use crate::core::value::{Context, Params, Value};

pub use crate::workflow::{Backoff, TaskBuilder, TaskDefinition, WorkflowBuilder, WorkflowDefinition};

pub use crate::condition::{ConditionError, ConditionEvaluator};

pub use crate::registry::{FnService, Service, ServiceRegistry};

pub use crate::engine::{
  ChannelHook, Engine, EngineConfig, ExecutionEvent, ExecutionHook, MetricsHook, MetricsSnapshot, TaskResult,
  TracingHook, WorkflowExecution,
};

pub use crate::error::{ConductorError, ConductorResult};

/*
    Core Workflow:
    1. Implement `Service` for each downstream capability (or wrap a closure in `FnService`).
    2. Register them by name in a `ServiceRegistry` and hand it to an `Engine` as an `Arc`.
    3. Describe the run with `WorkflowDefinition::builder(..)`, adding tasks built by
       `TaskDefinition::builder(task_id, service_name, method)`.
    4. Call `engine.execute_workflow(definition, initial_context)`; it returns an execution id at once.
    5. Poll `engine.get_execution_status(id)`, await `engine.wait(id)`, or attach an `ExecutionHook`.
*/
