// conductor/src/condition/parser.rs

//! Parses condition strings with the JEXL grammar (`jexl-parser`) and lowers
//! the result into the crate's own [`Expr`] tree.
//!
//! Only the boolean subset of JEXL is accepted: `&&`, `||`, `!`, the six
//! comparisons, number/string/boolean/`null` literals and dotted identifiers.
//! Arithmetic, `in`, transforms, indexing, filters and the ternary operator
//! are rejected. As in JEXL, `&&` and `||` share one precedence level and
//! associate to the left; parenthesize mixed chains.

use crate::condition::ast::{CompareOp, Expr};
use crate::condition::ConditionError;
use crate::core::value::Value;
use jexl_parser::ast::{Expression, OpCode, UnCode};
use jexl_parser::Parser;

/// Longest condition accepted, in bytes.
pub const MAX_CONDITION_LEN: usize = 4096;

/// Deepest parenthesis nesting accepted.
pub const MAX_NESTING: usize = 64;

/// Deepest operator tree accepted after lowering.
const MAX_DEPTH: usize = 256;

/// Parses a condition string into an expression tree.
pub fn parse(source: &str) -> Result<Expr, ConditionError> {
  if source.trim().is_empty() {
    return Err(ConditionError::Empty);
  }
  if source.len() > MAX_CONDITION_LEN {
    return Err(ConditionError::syntax(format!(
      "condition is {} bytes long; the limit is {}",
      source.len(),
      MAX_CONDITION_LEN
    )));
  }
  check_nesting(source)?;

  let parsed = Parser::parse(source).map_err(|err| ConditionError::syntax(err.to_string()))?;
  lower(parsed, 0)
}

/// Rejects parenthesis nesting beyond [`MAX_NESTING`], ignoring parentheses
/// inside string literals. Unbalanced input is left to the grammar.
fn check_nesting(source: &str) -> Result<(), ConditionError> {
  let mut depth = 0usize;
  let mut quote: Option<char> = None;
  let mut escaped = false;
  for c in source.chars() {
    if let Some(q) = quote {
      match c {
        _ if escaped => escaped = false,
        '\\' => escaped = true,
        _ if c == q => quote = None,
        _ => {}
      }
      continue;
    }
    match c {
      '\'' | '"' => quote = Some(c),
      '(' => {
        depth += 1;
        if depth > MAX_NESTING {
          return Err(ConditionError::syntax(format!(
            "parentheses nested deeper than {}",
            MAX_NESTING
          )));
        }
      }
      ')' => depth = depth.saturating_sub(1),
      _ => {}
    }
  }
  Ok(())
}

fn lower(expr: Expression, depth: usize) -> Result<Expr, ConditionError> {
  if depth > MAX_DEPTH {
    return Err(ConditionError::syntax(format!(
      "expression nested deeper than {}",
      MAX_DEPTH
    )));
  }
  let next = depth + 1;
  match expr {
    Expression::Boolean(b) => Ok(Expr::Literal(Value::Bool(b))),
    Expression::String(s) => Ok(Expr::Literal(Value::String(s))),
    Expression::Null => Ok(Expr::Literal(Value::Null)),
    Expression::Number(n) => number(n).map(Expr::Literal),
    Expression::Identifier(name) => Ok(Expr::Var(name)),
    Expression::DotOperation { subject, ident } => dotted_path(*subject, ident).map(Expr::Var),
    Expression::UnaryOperation {
      operation: UnCode::Not,
      right,
    } => Ok(Expr::Not(Box::new(lower(*right, next)?))),
    Expression::BinaryOperation {
      operation,
      left,
      right,
    } => {
      let op = match operation {
        OpCode::And => return Ok(Expr::And(Box::new(lower(*left, next)?), Box::new(lower(*right, next)?))),
        OpCode::Or => return Ok(Expr::Or(Box::new(lower(*left, next)?), Box::new(lower(*right, next)?))),
        OpCode::Equal => CompareOp::Eq,
        OpCode::NotEqual => CompareOp::Ne,
        OpCode::Less => CompareOp::Lt,
        OpCode::LessEqual => CompareOp::Le,
        OpCode::Greater => CompareOp::Gt,
        OpCode::GreaterEqual => CompareOp::Ge,
        other => return Err(ConditionError::syntax(format!("unsupported operator {:?}", other))),
      };
      Ok(Expr::compare(op, lower(*left, next)?, lower(*right, next)?))
    }
    _ => Err(ConditionError::syntax(
      "only comparisons, '&&', '||', '!', literals and dotted identifiers are supported",
    )),
  }
}

/// Flattens `a.b.c` (a left-nested chain of dot operations) into one path.
fn dotted_path(subject: Expression, last: String) -> Result<String, ConditionError> {
  let mut segments = vec![last];
  let mut cursor = subject;
  loop {
    match cursor {
      Expression::Identifier(root) => {
        segments.push(root);
        break;
      }
      Expression::DotOperation { subject, ident } => {
        segments.push(ident);
        cursor = *subject;
      }
      _ => return Err(ConditionError::syntax("'.' may only follow an identifier")),
    }
  }
  segments.reverse();
  Ok(segments.join("."))
}

/// Integral literals become JSON integers so `1` and a context value of `1`
/// compare equal structurally as well as numerically.
fn number(n: f64) -> Result<Value, ConditionError> {
  const EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
  if n.fract() == 0.0 && n.abs() < EXACT {
    return Ok(Value::from(n as i64));
  }
  serde_json::Number::from_f64(n)
    .map(Value::Number)
    .ok_or_else(|| ConditionError::syntax(format!("number {} is not representable", n)))
}
