// conductor/src/condition/ast.rs

//! Tagged expression tree for task conditions.

use crate::core::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl CompareOp {
  pub fn symbol(self) -> &'static str {
    match self {
      CompareOp::Eq => "==",
      CompareOp::Ne => "!=",
      CompareOp::Lt => "<",
      CompareOp::Le => "<=",
      CompareOp::Gt => ">",
      CompareOp::Ge => ">=",
    }
  }

  pub fn is_ordering(self) -> bool {
    !matches!(self, CompareOp::Eq | CompareOp::Ne)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  /// A JSON literal: number, string, `true`, `false` or `null`.
  Literal(Value),
  /// A context lookup by (possibly dotted) key path.
  Var(String),
  Compare {
    op: CompareOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Not(Box<Expr>),
  And(Box<Expr>, Box<Expr>),
  Or(Box<Expr>, Box<Expr>),
}

impl Expr {
  pub fn compare(op: CompareOp, lhs: Expr, rhs: Expr) -> Self {
    Expr::Compare {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }

  /// Every context key path the expression reads.
  pub fn variables(&self) -> Vec<&str> {
    let mut out = Vec::new();
    self.collect_variables(&mut out);
    out
  }

  fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
    match self {
      Expr::Literal(_) => {}
      Expr::Var(path) => out.push(path.as_str()),
      Expr::Compare { lhs, rhs, .. } | Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
        lhs.collect_variables(out);
        rhs.collect_variables(out);
      }
      Expr::Not(inner) => inner.collect_variables(out),
    }
  }
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expr::Literal(v) => write!(f, "{}", v),
      Expr::Var(path) => f.write_str(path),
      Expr::Compare { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
      Expr::Not(inner) => write!(f, "!{}", inner),
      Expr::And(l, r) => write!(f, "({} && {})", l, r),
      Expr::Or(l, r) => write!(f, "({} || {})", l, r),
    }
  }
}
