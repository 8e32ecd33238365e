// conductor/src/condition/mod.rs

//! Conditional task gating.
//!
//! A task's `condition` string is parsed with the JEXL grammar, lowered into
//! a small [`Expr`] tree and interpreted against a snapshot of the execution
//! context. Parsing happens once when a definition is validated; evaluation
//! is pure and never fails.

pub mod ast;
pub mod evaluator;
pub mod parser;

pub use ast::{CompareOp, Expr};
pub use evaluator::{evaluate, ConditionEvaluator};
pub use parser::parse;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
  #[error("condition is empty")]
  Empty,

  #[error("syntax error: {message}")]
  Syntax { message: String },
}

impl ConditionError {
  pub(crate) fn syntax(message: impl Into<String>) -> Self {
    ConditionError::Syntax {
      message: message.into(),
    }
  }
}
