// conductor/src/condition/evaluator.rs

//! Pure interpreter for condition expressions against a context snapshot.
//!
//! Evaluation is tri-state: a missing context key or a comparison between
//! incompatible types yields "unknown" rather than an error, and an unknown
//! outcome at the top level makes the whole condition false. A missing
//! precondition therefore skips the gated task instead of failing the run.

use crate::condition::ast::{CompareOp, Expr};
use crate::condition::parser;
use crate::core::value::{lookup_path, Context, Value};
use std::cmp::Ordering;
use tracing::{event, Level};

/// Stateless condition evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
  /// Parses and evaluates `condition` against `context`.
  ///
  /// Malformed conditions evaluate to false; definitions are validated at
  /// build time so this only happens for hand-constructed executions.
  pub fn evaluate(&self, condition: &str, context: &Context) -> bool {
    match parser::parse(condition) {
      Ok(expr) => self.evaluate_expr(&expr, context),
      Err(err) => {
        event!(Level::WARN, %condition, error = %err, "Condition failed to parse; treating as false.");
        false
      }
    }
  }

  pub fn evaluate_expr(&self, expr: &Expr, context: &Context) -> bool {
    let outcome = truth(expr, context);
    if outcome.is_none() {
      event!(Level::TRACE, condition = %expr, "Condition outcome unknown; treating as false.");
    }
    outcome.unwrap_or(false)
  }
}

/// Convenience wrapper around [`ConditionEvaluator::evaluate`].
pub fn evaluate(condition: &str, context: &Context) -> bool {
  ConditionEvaluator.evaluate(condition, context)
}

fn truth(expr: &Expr, context: &Context) -> Option<bool> {
  match expr {
    Expr::Literal(Value::Bool(b)) => Some(*b),
    Expr::Literal(_) => None,
    Expr::Var(path) => match lookup_path(context, path)? {
      Value::Bool(b) => Some(*b),
      _ => None,
    },
    Expr::Compare { op, lhs, rhs } => {
      let lhs = operand(lhs, context)?;
      let rhs = operand(rhs, context)?;
      compare(*op, &lhs, &rhs)
    }
    Expr::Not(inner) => truth(inner, context).map(|b| !b),
    Expr::And(l, r) => match (truth(l, context), truth(r, context)) {
      (Some(false), _) | (_, Some(false)) => Some(false),
      (Some(true), Some(true)) => Some(true),
      _ => None,
    },
    Expr::Or(l, r) => match (truth(l, context), truth(r, context)) {
      (Some(true), _) | (_, Some(true)) => Some(true),
      (Some(false), Some(false)) => Some(false),
      _ => None,
    },
  }
}

fn operand(expr: &Expr, context: &Context) -> Option<Value> {
  match expr {
    Expr::Literal(v) => Some(v.clone()),
    Expr::Var(path) => lookup_path(context, path).cloned(),
    nested => truth(nested, context).map(Value::Bool),
  }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Option<bool> {
  let ordering = match (lhs, rhs) {
    (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?)?,
    (Value::String(a), Value::String(b)) => a.cmp(b),
    (Value::Bool(a), Value::Bool(b)) if !op.is_ordering() => a.cmp(b),
    (Value::Null, Value::Null) if !op.is_ordering() => Ordering::Equal,
    (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) if !op.is_ordering() => {
      return Some((lhs == rhs) == (op == CompareOp::Eq));
    }
    _ => return None,
  };
  Some(match op {
    CompareOp::Eq => ordering == Ordering::Equal,
    CompareOp::Ne => ordering != Ordering::Equal,
    CompareOp::Lt => ordering == Ordering::Less,
    CompareOp::Le => ordering != Ordering::Greater,
    CompareOp::Gt => ordering == Ordering::Greater,
    CompareOp::Ge => ordering != Ordering::Less,
  })
}
