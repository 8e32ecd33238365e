// conductor/src/engine/mod.rs

//! Workflow execution: the `Engine` facade, its per-execution scheduler and
//! task executor, runtime state and observability hooks.

pub mod config;
pub mod execution;
pub(crate) mod executor;
pub mod hooks;
pub mod orchestrator;
pub(crate) mod scheduler;

pub use config::EngineConfig;
pub use execution::{TaskResult, WorkflowExecution};
pub use hooks::{ChannelHook, ExecutionEvent, ExecutionHook, MetricsHook, MetricsSnapshot, TracingHook};
pub use orchestrator::Engine;
