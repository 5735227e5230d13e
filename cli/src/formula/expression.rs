//! Evaluation of parsed formulas against a namespace.

use super::parser::{ArithOperator, CompareOperator, Expr, Program};
use crate::error::FormulaError;
use std::collections::HashMap;

/// Runtime value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Numeric value; `None` means unavailable
    Number(Option<f64>),
    Bool(bool),
    /// Named alternative compared by value, but `==`/`!=` between two
    /// handles compares which alternative it is
    Handle {
        id: &'static str,
        value: Option<f64>,
    },
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Value::Number(v) => v,
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            Value::Handle { value, .. } => value,
        }
    }

    pub fn truthy(&self) -> bool {
        match *self {
            Value::Bool(b) => b,
            _ => self.as_number().is_some_and(|v| v != 0.0 && !v.is_nan()),
        }
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        Value::Number(value)
    }
}

/// Variable lookup for formula evaluation.
pub trait Namespace {
    /// `None` means the name is unknown.
    fn lookup(&self, name: &str) -> Option<Value>;

    /// `name.attr`; unknown by default.
    fn attribute(&self, _name: &str, _attr: &str) -> Option<Value> {
        None
    }
}

impl Namespace for HashMap<String, Option<f64>> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).map(|v| Value::Number(*v))
    }
}

impl Namespace for HashMap<&'static str, Option<f64>> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).map(|v| Value::Number(*v))
    }
}

/// Evaluate a program. `Ok(None)` when no branch matched and there is no
/// `else` arm.
pub fn evaluate_program<N: Namespace + ?Sized>(
    program: &Program,
    namespace: &N,
) -> Result<Option<Value>, FormulaError> {
    for branch in &program.branches {
        if evaluate(&branch.condition, namespace)?.truthy() {
            return evaluate(&branch.value, namespace).map(Some);
        }
    }
    match &program.otherwise {
        Some(expr) => evaluate(expr, namespace).map(Some),
        None => Ok(None),
    }
}

pub fn evaluate<N: Namespace + ?Sized>(expr: &Expr, namespace: &N) -> Result<Value, FormulaError> {
    let value = match expr {
        Expr::Number(n) => Value::Number(Some(*n)),
        Expr::Bool(b) => Value::Bool(*b),
        Expr::Variable(name) => namespace
            .lookup(name)
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone()))?,
        Expr::Attribute { name, attr } => namespace
            .attribute(name, attr)
            .ok_or_else(|| FormulaError::UnknownVariable(format!("{}.{}", name, attr)))?,
        Expr::Neg(inner) => Value::Number(evaluate(inner, namespace)?.as_number().map(|v| -v)),
        Expr::Not(inner) => Value::Bool(!evaluate(inner, namespace)?.truthy()),
        Expr::And(left, right) => {
            Value::Bool(evaluate(left, namespace)?.truthy() && evaluate(right, namespace)?.truthy())
        }
        Expr::Or(left, right) => {
            Value::Bool(evaluate(left, namespace)?.truthy() || evaluate(right, namespace)?.truthy())
        }
        Expr::Binary { left, op, right } => {
            let l = evaluate(left, namespace)?.as_number();
            let r = evaluate(right, namespace)?.as_number();
            Value::Number(arith(*op, l, r))
        }
        Expr::Compare { left, op, right } => {
            let l = evaluate(left, namespace)?;
            let r = evaluate(right, namespace)?;
            Value::Bool(compare(*op, l, r))
        }
    };
    Ok(value)
}

fn arith(op: ArithOperator, left: Option<f64>, right: Option<f64>) -> Option<f64> {
    let (l, r) = (left?, right?);
    let result = match op {
        ArithOperator::Add => l + r,
        ArithOperator::Sub => l - r,
        ArithOperator::Mul => l * r,
        ArithOperator::Div => {
            if r == 0.0 {
                return None;
            }
            l / r
        }
    };
    Some(result).filter(|v| v.is_finite())
}

fn compare(op: CompareOperator, left: Value, right: Value) -> bool {
    if let (Value::Handle { id: a, .. }, Value::Handle { id: b, .. }) = (left, right) {
        match op {
            CompareOperator::Eq => return a == b,
            CompareOperator::Ne => return a != b,
            _ => {}
        }
    }

    let (Some(l), Some(r)) = (left.as_number(), right.as_number()) else {
        return false;
    };
    match op {
        CompareOperator::Eq => l == r,
        CompareOperator::Ne => l != r,
        CompareOperator::Lt => l < r,
        CompareOperator::Le => l <= r,
        CompareOperator::Gt => l > r,
        CompareOperator::Ge => l >= r,
    }
}
