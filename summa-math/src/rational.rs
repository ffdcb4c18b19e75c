//! Rational number type providing exact fraction arithmetic
//!
//! This module implements the Rational type used for every monetary value in
//! the accounting core. Unlike `BigRational`, arithmetic here does not reduce
//! results automatically; reduction happens on demand through [`Rational::simplify`]
//! so chains of intermediate operations don't pay a GCD per step. Equality and
//! ordering always compare by value, never by raw numerator/denominator.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during rational number operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RationalError {
    /// A rational was constructed with a zero denominator
    #[error("Denominator must not be zero")]
    ZeroDenominator,
    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,
    /// Exponent does not reduce to an integer
    #[error("Exponent must be an integer, got {0}")]
    NonIntegerExponent(String),
    /// Exponent is an integer but too large to apply
    #[error("Exponent out of range: {0}")]
    ExponentOutOfRange(String),
    /// Value has a nonzero remainder and cannot become an integer
    #[error("Value {0} is not an integer")]
    NotAnInteger(String),
    /// Cannot parse a rational from the given string
    #[error("Cannot parse rational from string: {0}")]
    Parse(String),
}

/// Result type for rational operations
pub type RationalResult<T> = Result<T, RationalError>;

/// An exact fraction of two big integers
///
/// The denominator is never zero. The stored form is not necessarily
/// reduced; call [`Rational::simplify`] for the canonical form with a
/// positive denominator and coprime terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rational {
    numer: BigInt,
    denom: BigInt,
}

impl Rational {
    /// Create a rational from a numerator and denominator
    pub fn new(numer: BigInt, denom: BigInt) -> RationalResult<Self> {
        if denom.is_zero() {
            return Err(RationalError::ZeroDenominator);
        }
        Ok(Self { numer, denom })
    }

    /// Create a rational from an integer
    pub fn from_integer(value: BigInt) -> Self {
        Self { numer: value, denom: BigInt::one() }
    }

    /// Create a rational from an i64
    pub fn from_i64(value: i64) -> Self {
        Self::from_integer(BigInt::from(value))
    }

    /// Create a ratio of two i64 values
    pub fn from_ratio(numer: i64, denom: i64) -> RationalResult<Self> {
        Self::new(BigInt::from(numer), BigInt::from(denom))
    }

    /// The rational zero
    pub fn zero() -> Self {
        Self::from_i64(0)
    }

    /// The rational one
    pub fn one() -> Self {
        Self::from_i64(1)
    }

    /// Create a rational from a decimal value
    pub fn from_decimal(decimal: Decimal) -> Self {
        let scale = decimal.scale();
        let numer = BigInt::from(decimal.mantissa());
        let denom = Pow::pow(BigInt::from(10u64), scale);
        Self { numer, denom }
    }

    /// Parse a rational from a string
    ///
    /// Accepts either a decimal literal ("12.5") or a fraction ("25/2").
    pub fn parse(value_str: &str) -> RationalResult<Self> {
        let trimmed = value_str.trim();
        if let Some((n, d)) = trimmed.split_once('/') {
            let numer = BigInt::from_str(n.trim())
                .map_err(|e| RationalError::Parse(format!("{}: {}", trimmed, e)))?;
            let denom = BigInt::from_str(d.trim())
                .map_err(|e| RationalError::Parse(format!("{}: {}", trimmed, e)))?;
            return Self::new(numer, denom);
        }
        let decimal =
            trimmed.parse::<Decimal>().map_err(|e| RationalError::Parse(e.to_string()))?;
        Ok(Self::from_decimal(decimal))
    }

    /// Get the numerator as stored
    pub fn numer(&self) -> &BigInt {
        &self.numer
    }

    /// Get the denominator as stored
    pub fn denom(&self) -> &BigInt {
        &self.denom
    }

    /// Check if this rational is exactly zero
    pub fn is_zero(&self) -> bool {
        self.numer.is_zero()
    }

    /// Get the sign of this rational: -1, 0, or 1
    pub fn sign(&self) -> i32 {
        if self.numer.is_zero() {
            0
        } else if self.numer.is_negative() == self.denom.is_negative() {
            1
        } else {
            -1
        }
    }

    /// Check if this rational is strictly positive
    pub fn is_positive(&self) -> bool {
        self.sign() > 0
    }

    /// Check if this rational is strictly negative
    pub fn is_negative(&self) -> bool {
        self.sign() < 0
    }

    /// Get the absolute value
    pub fn abs(&self) -> Self {
        Self { numer: self.numer.abs(), denom: self.denom.abs() }
    }

    /// Reduce to canonical form
    ///
    /// Divides numerator and denominator by their GCD and normalizes the
    /// sign so the denominator is positive. Idempotent.
    pub fn simplify(&self) -> Self {
        if self.numer.is_zero() {
            return Self { numer: BigInt::zero(), denom: BigInt::one() };
        }
        let gcd = self.numer.gcd(&self.denom);
        let mut numer = &self.numer / &gcd;
        let mut denom = &self.denom / &gcd;
        if denom.is_negative() {
            numer = -numer;
            denom = -denom;
        }
        Self { numer, denom }
    }

    /// Add another rational
    pub fn add(&self, other: &Rational) -> Self {
        Self {
            numer: &self.numer * &other.denom + &other.numer * &self.denom,
            denom: &self.denom * &other.denom,
        }
    }

    /// Subtract another rational
    pub fn subtract(&self, other: &Rational) -> Self {
        Self {
            numer: &self.numer * &other.denom - &other.numer * &self.denom,
            denom: &self.denom * &other.denom,
        }
    }

    /// Multiply by another rational
    pub fn multiply(&self, other: &Rational) -> Self {
        Self { numer: &self.numer * &other.numer, denom: &self.denom * &other.denom }
    }

    /// Divide by another rational
    pub fn divide(&self, other: &Rational) -> RationalResult<Self> {
        if other.is_zero() {
            return Err(RationalError::DivisionByZero);
        }
        Ok(Self { numer: &self.numer * &other.denom, denom: &self.denom * &other.numer })
    }

    /// Remainder of truncated division by another rational
    ///
    /// The result carries the sign of the dividend, matching integer `%`.
    pub fn modulo(&self, other: &Rational) -> RationalResult<Self> {
        if other.is_zero() {
            return Err(RationalError::DivisionByZero);
        }
        let quotient = self.divide(other)?;
        // BigInt division truncates toward zero, which is exactly the
        // truncation needed here.
        let truncated = &quotient.numer / &quotient.denom;
        Ok(self.subtract(&other.multiply(&Self::from_integer(truncated))))
    }

    /// Raise to a rational power
    ///
    /// The exponent must reduce to an integer. Negative exponents invert;
    /// zero raised to a negative exponent is a division by zero.
    pub fn pow(&self, exponent: &Rational) -> RationalResult<Self> {
        let reduced = exponent.simplify();
        if !reduced.denom.is_one() {
            return Err(RationalError::NonIntegerExponent(reduced.to_string()));
        }
        let exp = reduced
            .numer
            .to_i32()
            .ok_or_else(|| RationalError::ExponentOutOfRange(reduced.to_string()))?;
        if exp >= 0 {
            let e = exp as u32;
            Ok(Self { numer: (&self.numer).pow(e), denom: (&self.denom).pow(e) })
        } else {
            if self.is_zero() {
                return Err(RationalError::DivisionByZero);
            }
            let e = exp.unsigned_abs();
            Ok(Self { numer: (&self.denom).pow(e), denom: (&self.numer).pow(e) })
        }
    }

    /// Check if this rational reduces to a whole number
    pub fn is_integer(&self) -> bool {
        (&self.numer % &self.denom).is_zero()
    }

    /// Convert to a big integer, failing if the remainder is nonzero
    pub fn to_integer(&self) -> RationalResult<BigInt> {
        if !self.is_integer() {
            return Err(RationalError::NotAnInteger(self.to_string()));
        }
        Ok(&self.numer / &self.denom)
    }

    /// Convert to a decimal value for presentation
    ///
    /// May round for values outside decimal range; calculations must stay
    /// on [`Rational`] and only cross this boundary at output time.
    pub fn to_decimal(&self) -> Decimal {
        let reduced = self.simplify();
        if let (Some(numer), Some(denom)) =
            (reduced.numer.to_i128(), reduced.denom.to_i128())
        {
            if let (Ok(n), Ok(d)) = (
                Decimal::try_from_i128_with_scale(numer, 0),
                Decimal::try_from_i128_with_scale(denom, 0),
            ) {
                if !d.is_zero() {
                    return n / d;
                }
            }
        }
        // Fallback for magnitudes beyond decimal range
        self.to_f64().and_then(|f| Decimal::try_from(f).ok()).unwrap_or(Decimal::ZERO)
    }

    /// Convert to f64, losing exactness
    pub fn to_f64(&self) -> Option<f64> {
        self.to_big_rational().to_f64()
    }

    /// Convert to the `num` ecosystem's reduced rational representation
    pub fn to_big_rational(&self) -> BigRational {
        BigRational::new(self.numer.clone(), self.denom.clone())
    }

    /// Sign-normalized terms for cross-multiplied comparison
    fn normalized_terms(&self) -> (BigInt, BigInt) {
        if self.denom.is_negative() {
            (-&self.numer, -&self.denom)
        } else {
            (self.numer.clone(), self.denom.clone())
        }
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Rational {}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        let (ln, ld) = self.normalized_terms();
        let (rn, rd) = other.normalized_terms();
        (ln * rd).cmp(&(rn * ld))
    }
}

impl Add for &Rational {
    type Output = Rational;

    fn add(self, rhs: &Rational) -> Rational {
        Rational::add(self, rhs)
    }
}

impl Sub for &Rational {
    type Output = Rational;

    fn sub(self, rhs: &Rational) -> Rational {
        self.subtract(rhs)
    }
}

impl Mul for &Rational {
    type Output = Rational;

    fn mul(self, rhs: &Rational) -> Rational {
        self.multiply(rhs)
    }
}

impl Neg for &Rational {
    type Output = Rational;

    fn neg(self) -> Rational {
        Rational { numer: -&self.numer, denom: self.denom.clone() }
    }
}

impl From<BigRational> for Rational {
    fn from(value: BigRational) -> Self {
        Self { numer: value.numer().clone(), denom: value.denom().clone() }
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reduced = self.simplify();
        if reduced.denom.is_one() {
            write!(f, "{}", reduced.numer)
        } else {
            write!(f, "{}/{}", reduced.numer, reduced.denom)
        }
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominator_rejected() {
        assert_eq!(
            Rational::new(BigInt::from(1), BigInt::from(0)),
            Err(RationalError::ZeroDenominator)
        );
    }

    #[test]
    fn test_arithmetic_does_not_reduce() {
        let a = Rational::from_ratio(1, 2).unwrap();
        let b = Rational::from_ratio(1, 2).unwrap();
        let sum = &a + &b;
        // 1/2 + 1/2 keeps the raw 4/4 form until simplified
        assert_eq!(sum.numer(), &BigInt::from(4));
        assert_eq!(sum.denom(), &BigInt::from(4));
        assert_eq!(sum.simplify().denom(), &BigInt::from(1));
        assert_eq!(sum, Rational::one());
    }

    #[test]
    fn test_simplify_normalizes_sign() {
        let r = Rational::new(BigInt::from(3), BigInt::from(-6)).unwrap().simplify();
        assert_eq!(r.numer(), &BigInt::from(-1));
        assert_eq!(r.denom(), &BigInt::from(2));
    }

    #[test]
    fn test_equality_is_by_value() {
        let six_fourths = Rational::from_ratio(6, 4).unwrap();
        let three_halves = Rational::from_ratio(3, 2).unwrap();
        assert_eq!(six_fourths, three_halves);
        assert_eq!(six_fourths.simplify(), three_halves.simplify());
    }

    #[test]
    fn test_division_by_zero() {
        let a = Rational::from_i64(5);
        assert_eq!(a.divide(&Rational::zero()), Err(RationalError::DivisionByZero));
        assert_eq!(a.modulo(&Rational::zero()), Err(RationalError::DivisionByZero));
    }

    #[test]
    fn test_modulo_follows_dividend_sign() {
        let a = Rational::from_ratio(7, 2).unwrap();
        let b = Rational::from_i64(2);
        assert_eq!(a.modulo(&b).unwrap(), Rational::from_ratio(3, 2).unwrap());

        let neg = Rational::from_ratio(-7, 2).unwrap();
        assert_eq!(neg.modulo(&b).unwrap(), Rational::from_ratio(-3, 2).unwrap());
    }

    #[test]
    fn test_pow_integer_exponents() {
        let base = Rational::from_ratio(2, 3).unwrap();
        assert_eq!(base.pow(&Rational::from_i64(2)).unwrap(), Rational::from_ratio(4, 9).unwrap());
        assert_eq!(
            base.pow(&Rational::from_i64(-1)).unwrap(),
            Rational::from_ratio(3, 2).unwrap()
        );
        // An exponent stored as 4/2 still reduces to an integer
        assert_eq!(
            base.pow(&Rational::from_ratio(4, 2).unwrap()).unwrap(),
            Rational::from_ratio(4, 9).unwrap()
        );
    }

    #[test]
    fn test_pow_non_integer_exponent() {
        let base = Rational::from_i64(2);
        assert!(matches!(
            base.pow(&Rational::from_ratio(1, 2).unwrap()),
            Err(RationalError::NonIntegerExponent(_))
        ));
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(
            Rational::from_ratio(6, 3).unwrap().to_integer().unwrap(),
            BigInt::from(2)
        );
        assert!(matches!(
            Rational::from_ratio(1, 3).unwrap().to_integer(),
            Err(RationalError::NotAnInteger(_))
        ));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Rational::parse("12.5").unwrap(), Rational::from_ratio(25, 2).unwrap());
        assert_eq!(Rational::parse("25/2").unwrap(), Rational::from_ratio(25, 2).unwrap());
        assert!(Rational::parse("not a number").is_err());
        assert!(Rational::parse("1/0").is_err());
    }

    #[test]
    fn test_ordering_with_negative_denominators() {
        let a = Rational::new(BigInt::from(1), BigInt::from(-2)).unwrap();
        let b = Rational::from_ratio(-1, 2).unwrap();
        assert_eq!(a, b);
        assert!(a < Rational::zero());
    }

    #[test]
    fn test_display() {
        assert_eq!(Rational::from_ratio(6, 4).unwrap().to_string(), "3/2");
        assert_eq!(Rational::from_ratio(8, 4).unwrap().to_string(), "2");
    }
}
