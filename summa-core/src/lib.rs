//! Core computation engine for Summa
//!
//! This crate derives currency exchange rates across an incomplete,
//! time-varying graph of observed conversions, aggregates financial amounts
//! into hierarchical time periods, and evaluates arithmetic formulas over
//! those aggregates using exact rational numbers. Storage, HTTP, and
//! authentication live outside; the engine consumes pre-loaded records and
//! previously computed summary rows.

#![warn(clippy::all)]
#![warn(missing_docs)]

/// Module for account, collection, and currency records
pub mod account;

/// Module for scalar/sequence broadcast arithmetic
pub mod broadcast;

/// Module for exchange rate derivation over observed conversion edges
pub mod exchange;

/// Module for formula parsing and evaluation
pub mod formula;

/// Module for the time group aggregation hierarchy
pub mod timegroup;

pub use account::{Account, AccountBook, AccountId, AccountKind, ActivityId, CollectionId, CurrencyId, PeriodId};
pub use broadcast::{BinaryOp, BroadcastError, SelectorHandle, Value};
pub use exchange::{DerivedRate, ExchangeError, ExchangeRateGraph, ExchangeRateInfo};
pub use formula::{EvaluationScope, Evaluator, FormulaError, RateBasis};
pub use timegroup::{
    FlowRow, FrozenAccountCache, FrozenAccountMap, FrozenPeriod, PeriodicTimeGroup, RowOwner,
    SortBasis, SummaryRow, TimeGroup, UnfrozenTimeGroup, YearlyTimeGroup,
};
