//! Scalar/sequence broadcast arithmetic over rationals
//!
//! Formula nodes exchange three value shapes: a single rational, an ordered
//! sequence of rationals (one per time slice), and an unconsumed selector
//! handle. Binary operators pair a scalar with every element of a sequence,
//! or two equal-length sequences element by element. Division and modulo by
//! a zero divisor yield zero instead of failing so evaluation stays total
//! over sparse data; every other failure is surfaced.

use std::fmt;

use serde::{Deserialize, Serialize};
use summa_math::{Rational, RationalError};
use thiserror::Error;

/// Errors that can occur while combining formula values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// An operand is not a numeric shape the operators understand
    #[error("Cannot resolve operand for arithmetic: {0}")]
    UnresolvedOperand(String),
    /// Two sequences with different slice counts were paired
    #[error("Sequence lengths differ: {left} vs {right}")]
    SequenceLengthMismatch {
        /// Slice count of the left operand
        left: usize,
        /// Slice count of the right operand
        right: usize,
    },
    /// Arithmetic failure on a resolved pair
    #[error(transparent)]
    Rational(#[from] RationalError),
}

/// Result type for broadcast operations
pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Opaque key into the evaluator's per-evaluation selector cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectorHandle(pub(crate) usize);

/// A value exchanged between formula nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A single rational
    Rational(Rational),
    /// One rational per time slice
    Sequence(Vec<Rational>),
    /// A registered account-set reference awaiting a procedure call
    Selector(SelectorHandle),
}

impl Value {
    /// Short shape name for error messages
    pub fn shape_name(&self) -> &'static str {
        match self {
            Value::Rational(_) => "rational",
            Value::Sequence(_) => "sequence",
            Value::Selector(_) => "selector",
        }
    }
}

/// Binary operators the formula language supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division (zero divisor yields zero)
    Div,
    /// Modulo (zero divisor yields zero)
    Mod,
    /// Exponentiation (integer exponents only)
    Pow,
    /// Equality comparison, producing 0 or 1
    Eq,
    /// Inequality comparison
    Ne,
    /// Less-than comparison
    Lt,
    /// Greater-than comparison
    Gt,
    /// Less-or-equal comparison
    Le,
    /// Greater-or-equal comparison
    Ge,
}

impl BinaryOp {
    /// Operator precedence (higher binds tighter)
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le
            | BinaryOp::Ge => 1,
            BinaryOp::Add | BinaryOp::Sub => 2,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 3,
            BinaryOp::Pow => 4,
        }
    }

    /// Whether the operator groups right-to-left
    pub fn is_right_associative(&self) -> bool {
        matches!(self, BinaryOp::Pow)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        };
        write!(f, "{}", op)
    }
}

/// Apply a binary operator with broadcast resolution
pub fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> BroadcastResult<Value> {
    match (lhs, rhs) {
        (Value::Rational(a), Value::Rational(b)) => Ok(Value::Rational(apply_pair(op, a, b)?)),
        (Value::Rational(a), Value::Sequence(bs)) => {
            let paired: BroadcastResult<Vec<Rational>> =
                bs.iter().map(|b| apply_pair(op, a, b)).collect();
            Ok(Value::Sequence(paired?))
        }
        (Value::Sequence(a_items), Value::Rational(b)) => {
            let paired: BroadcastResult<Vec<Rational>> =
                a_items.iter().map(|a| apply_pair(op, a, b)).collect();
            Ok(Value::Sequence(paired?))
        }
        (Value::Sequence(a_items), Value::Sequence(b_items)) => {
            if a_items.len() != b_items.len() {
                return Err(BroadcastError::SequenceLengthMismatch {
                    left: a_items.len(),
                    right: b_items.len(),
                });
            }
            let paired: BroadcastResult<Vec<Rational>> = a_items
                .iter()
                .zip(b_items.iter())
                .map(|(a, b)| apply_pair(op, a, b))
                .collect();
            Ok(Value::Sequence(paired?))
        }
        (Value::Selector(_), other) | (other, Value::Selector(_)) => {
            Err(BroadcastError::UnresolvedOperand(format!(
                "selector paired with {} in {}",
                other.shape_name(),
                op
            )))
        }
    }
}

/// Negate a value across its shape
pub fn negate(value: &Value) -> BroadcastResult<Value> {
    match value {
        Value::Rational(a) => Ok(Value::Rational(-a)),
        Value::Sequence(items) => Ok(Value::Sequence(items.iter().map(|a| -a).collect())),
        Value::Selector(_) => {
            Err(BroadcastError::UnresolvedOperand("cannot negate a selector".to_string()))
        }
    }
}

/// Apply an operator to one resolved pair of rationals
fn apply_pair(op: BinaryOp, a: &Rational, b: &Rational) -> BroadcastResult<Rational> {
    let result = match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => a.subtract(b),
        BinaryOp::Mul => a.multiply(b),
        // Zero divisors are permissive: sparse data divides to zero.
        BinaryOp::Div => {
            if b.is_zero() {
                Rational::zero()
            } else {
                a.divide(b)?
            }
        }
        BinaryOp::Mod => {
            if b.is_zero() {
                Rational::zero()
            } else {
                a.modulo(b)?
            }
        }
        BinaryOp::Pow => a.pow(b)?,
        BinaryOp::Eq => bool_rational(a == b),
        BinaryOp::Ne => bool_rational(a != b),
        BinaryOp::Lt => bool_rational(a < b),
        BinaryOp::Gt => bool_rational(a > b),
        BinaryOp::Le => bool_rational(a <= b),
        BinaryOp::Ge => bool_rational(a >= b),
    };
    Ok(result)
}

fn bool_rational(condition: bool) -> Rational {
    if condition {
        Rational::one()
    } else {
        Rational::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(values: &[i64]) -> Value {
        Value::Sequence(values.iter().map(|v| Rational::from_i64(*v)).collect())
    }

    fn scalar(value: i64) -> Value {
        Value::Rational(Rational::from_i64(value))
    }

    #[test]
    fn test_scalar_plus_sequence_broadcasts() {
        let result = apply_binary(BinaryOp::Add, &scalar(3), &seq(&[1, 2, 3])).unwrap();
        assert_eq!(result, seq(&[4, 5, 6]));
    }

    #[test]
    fn test_sequence_div_sequence_is_elementwise() {
        let result = apply_binary(BinaryOp::Div, &seq(&[2, 4]), &seq(&[2, 2])).unwrap();
        assert_eq!(result, seq(&[1, 2]));
    }

    #[test]
    fn test_zero_divisor_yields_zero() {
        assert_eq!(apply_binary(BinaryOp::Div, &scalar(5), &scalar(0)).unwrap(), scalar(0));
        assert_eq!(apply_binary(BinaryOp::Mod, &scalar(5), &scalar(0)).unwrap(), scalar(0));
        // And per pairing inside a sequence.
        assert_eq!(
            apply_binary(BinaryOp::Div, &seq(&[8, 9]), &seq(&[2, 0])).unwrap(),
            seq(&[4, 0])
        );
    }

    #[test]
    fn test_length_mismatch_is_a_hard_failure() {
        assert_eq!(
            apply_binary(BinaryOp::Add, &seq(&[1, 2]), &seq(&[1, 2, 3])),
            Err(BroadcastError::SequenceLengthMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn test_selector_operand_is_unresolved() {
        let selector = Value::Selector(SelectorHandle(0));
        assert!(matches!(
            apply_binary(BinaryOp::Mul, &selector, &scalar(2)),
            Err(BroadcastError::UnresolvedOperand(_))
        ));
        assert!(matches!(negate(&selector), Err(BroadcastError::UnresolvedOperand(_))));
    }

    #[test]
    fn test_pow_requires_integer_exponent() {
        let half = Value::Rational(Rational::from_ratio(1, 2).unwrap());
        assert!(matches!(
            apply_binary(BinaryOp::Pow, &scalar(2), &half),
            Err(BroadcastError::Rational(RationalError::NonIntegerExponent(_)))
        ));
        assert_eq!(apply_binary(BinaryOp::Pow, &scalar(2), &scalar(3)).unwrap(), scalar(8));
    }

    #[test]
    fn test_comparisons_produce_indicator_rationals() {
        assert_eq!(apply_binary(BinaryOp::Lt, &scalar(1), &scalar(2)).unwrap(), scalar(1));
        assert_eq!(
            apply_binary(BinaryOp::Ge, &seq(&[1, 5]), &scalar(3)).unwrap(),
            seq(&[0, 1])
        );
    }

    #[test]
    fn test_negate_sequence() {
        assert_eq!(negate(&seq(&[1, -2])).unwrap(), seq(&[-1, 2]));
    }
}
