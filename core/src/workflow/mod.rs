// conductor/src/workflow/mod.rs

//! Declarative workflow and task definitions, their builders and validation.

pub mod definition;
pub mod graph;
pub mod task;

pub use definition::{WorkflowBuilder, WorkflowDefinition};
pub use task::{Backoff, TaskBuilder, TaskDefinition};
