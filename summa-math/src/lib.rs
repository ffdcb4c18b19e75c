//! Arbitrary precision mathematical operations for Summa
//!
//! This crate provides the exact arithmetic foundation for the accounting
//! core: a rational number type backed by big integers, and date/time
//! helpers pinned to the platform's reference time zone. Nothing here ever
//! rounds through floating point; conversions to decimal exist only at the
//! presentation boundary.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod datetime;
pub mod rational;

// Re-export main types
pub use datetime::{
    day_end, day_start, format_timestamp, parse_timestamp, year_of, DateTimeError,
    DateTimeResult, Timestamp, DEFAULT_TIMEZONE,
};
pub use rational::{Rational, RationalError, RationalResult};

// Re-export for convenience
pub use num_bigint::BigInt;
pub use num_rational::BigRational;
pub use rust_decimal::Decimal;
