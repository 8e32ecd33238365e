pub mod control;
pub mod serde_duration;
pub mod shared;
pub mod status;
pub mod value;

// Re-export key types for easier access from other conductor modules.
pub use control::ErrorHandling;
pub use shared::Shared;
pub use status::{TaskStatus, WorkflowStatus};
pub use value::{Context, Params, Value};
