use super::bindings::Bindings;
use crate::ast::{Expression, InputSource, Value};
use crate::error::EvaluationError;
use std::cmp::Ordering;

// This macro generates a match arm for a binary operation.
macro_rules! eval_op {
    ($self:ident, $l:ident, $r:ident, $op_str:expr, $op_fn:expr, number) => {
        $self.eval_arithmetic($l, $r, $op_str, $op_fn)
    };
    ($self:ident, $l:ident, $r:ident, $op_str:expr, $op_fn:expr, ordering) => {
        $self.eval_comparison($l, $r, $op_str, $op_fn)
    };
}

/// Evaluates expressions against the bindings of one traversal.
pub(super) struct ExpressionEngine<'b, 'r> {
    bindings: &'b Bindings<'r>,
}

impl<'b, 'r> ExpressionEngine<'b, 'r> {
    pub(super) fn new(bindings: &'b Bindings<'r>) -> Self {
        Self { bindings }
    }

    pub(super) fn evaluate(&self, expr: &Expression) -> Result<Value, EvaluationError> {
        match expr {
            // --- Arithmetic Operations ---
            Expression::Sum(l, r) => eval_op!(self, l, r, "+", |a, b| a + b, number),
            Expression::Subtract(l, r) => eval_op!(self, l, r, "-", |a, b| a - b, number),
            Expression::Multiply(l, r) => eval_op!(self, l, r, "*", |a, b| a * b, number),
            Expression::Divide(l, r) => eval_op!(self, l, r, "/", |a, b| a / b, number),

            // --- Comparison Operations ---
            Expression::GreaterThan(l, r) => {
                eval_op!(self, l, r, ">", |o| o == Ordering::Greater, ordering)
            }
            Expression::SmallerThan(l, r) => {
                eval_op!(self, l, r, "<", |o| o == Ordering::Less, ordering)
            }
            Expression::GreaterThanOrEqual(l, r) => {
                eval_op!(self, l, r, ">=", |o| o != Ordering::Less, ordering)
            }
            Expression::SmallerThanOrEqual(l, r) => {
                eval_op!(self, l, r, "<=", |o| o != Ordering::Greater, ordering)
            }

            // --- Equality ---
            Expression::Equal(l, r) => Ok(Value::Bool(self.evaluate(l)? == self.evaluate(r)?)),
            Expression::NotEqual(l, r) => Ok(Value::Bool(self.evaluate(l)? != self.evaluate(r)?)),

            // --- Logical Operations ---
            Expression::And(l, r) => match self.evaluate(l)? {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => self.expect_bool("and", self.evaluate(r)?),
                other => Err(type_mismatch("and", "Bool", other)),
            },
            Expression::Or(l, r) => match self.evaluate(l)? {
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => self.expect_bool("or", self.evaluate(r)?),
                other => Err(type_mismatch("or", "Bool", other)),
            },
            Expression::Not(v) => match self.evaluate(v)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(type_mismatch("not", "Bool", other)),
            },

            // --- Leaves ---
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Input(InputSource::Field { name }) => Ok(self.bindings.field(name)),
            Expression::Input(InputSource::Node { id }) => Ok(self.bindings.node(id)),
        }
    }

    fn expect_bool(&self, op: &str, value: Value) -> Result<Value, EvaluationError> {
        match value {
            Value::Bool(_) => Ok(value),
            other => Err(type_mismatch(op, "Bool", other)),
        }
    }

    fn eval_arithmetic<F>(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        f: F,
    ) -> Result<Value, EvaluationError>
    where
        F: Fn(f64, f64) -> f64,
    {
        match (self.evaluate(l)?, self.evaluate(r)?) {
            (Value::Number(lv), Value::Number(rv)) => Ok(Value::Number(f(lv, rv))),
            (Value::Number(_), r_val) => Err(type_mismatch(op, "Number", r_val)),
            (l_val, _) => Err(type_mismatch(op, "Number", l_val)),
        }
    }

    /// Orders two Numbers or two Strings. NaN compares false against everything.
    fn eval_comparison<F>(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        f: F,
    ) -> Result<Value, EvaluationError>
    where
        F: Fn(Ordering) -> bool,
    {
        let left = self.evaluate(l)?;
        let right = self.evaluate(r)?;
        match (&left, &right) {
            (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
                Ok(Value::Bool(left.compare(&right).is_some_and(f)))
            }
            (Value::Number(_), _) => Err(type_mismatch(op, "Number", right)),
            (Value::String(_), _) => Err(type_mismatch(op, "String", right)),
            _ => Err(type_mismatch(op, "Number or String", left)),
        }
    }
}

pub(super) fn type_mismatch(op: &str, expected: &str, found: Value) -> EvaluationError {
    EvaluationError::TypeMismatch {
        operation: op.to_string(),
        expected: expected.to_string(),
        found,
    }
}
