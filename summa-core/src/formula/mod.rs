//! Formula parsing and evaluation
//!
//! A formula is a small arithmetic language over account selectors and
//! aggregate procedures. Leaf selectors register a query descriptor in a
//! per-evaluation cache; `TOTAL_*` procedures resolve the cached descriptor
//! to concrete accounts, query every time group in scope, convert each
//! currency bucket to the destination currency, and hand the resulting
//! sequences to the broadcast arithmetic engine. The result is one rational
//! per time slice.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use summa_math::{Rational, Timestamp};
use thiserror::Error;

use crate::account::{Account, AccountBook, AccountKind, ActivityId, CollectionId, CurrencyId};
use crate::broadcast::{apply_binary, negate, BinaryOp, BroadcastError, SelectorHandle, Value};
use crate::exchange::{ExchangeError, ExchangeRateGraph, ExchangeRateInfo};
use crate::timegroup::TimeGroup;

pub mod parser;

/// Errors that can occur while parsing or evaluating a formula
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    /// The formula text does not parse
    #[error("Invalid formula syntax: {0}")]
    InvalidSyntax(String),
    /// A selector references an unknown account kind or collection
    #[error("Unknown selector: {0}")]
    UnknownSelector(String),
    /// A procedure was called with the wrong number of arguments
    #[error("Procedure {procedure} expects {expected} argument(s), got {found}")]
    InvalidArgCount {
        /// The procedure that was called
        procedure: String,
        /// How many arguments it takes
        expected: usize,
        /// How many arguments appeared in the formula
        found: usize,
    },
    /// Arithmetic or operand-shape failure
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    /// Exchange rate derivation failure
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Result type for formula operations
pub type FormulaResult<T> = Result<T, FormulaError>;

/// A parsed selector: which accounts (or activity) a token denotes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorSpec {
    /// Every account of one kind
    Kind(AccountKind),
    /// The member accounts of a collection
    Collection(CollectionId),
    /// One cash-flow activity
    Activity(ActivityId),
}

/// Aggregate procedures the formula language exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Procedure {
    /// Total adjusted opened amount, debit view
    TotalOpenedDebitAmount,
    /// Total adjusted opened amount, credit view
    TotalOpenedCreditAmount,
    /// Total unadjusted debits
    TotalUnadjustedDebitAmount,
    /// Total unadjusted credits
    TotalUnadjustedCreditAmount,
    /// Total adjusted closed amount, debit view
    TotalClosedDebitAmount,
    /// Total adjusted closed amount, credit view
    TotalClosedCreditAmount,
    /// Total net cash flow for one activity
    TotalNetCashFlowAmount,
}

impl Procedure {
    /// How many arguments the procedure takes
    pub fn arity(&self) -> usize {
        match self {
            Procedure::TotalNetCashFlowAmount => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Procedure::TotalOpenedDebitAmount => "TOTAL_OPENED_DEBIT_AMOUNT",
            Procedure::TotalOpenedCreditAmount => "TOTAL_OPENED_CREDIT_AMOUNT",
            Procedure::TotalUnadjustedDebitAmount => "TOTAL_UNADJUSTED_DEBIT_AMOUNT",
            Procedure::TotalUnadjustedCreditAmount => "TOTAL_UNADJUSTED_CREDIT_AMOUNT",
            Procedure::TotalClosedDebitAmount => "TOTAL_CLOSED_DEBIT_AMOUNT",
            Procedure::TotalClosedCreditAmount => "TOTAL_CLOSED_CREDIT_AMOUNT",
            Procedure::TotalNetCashFlowAmount => "TOTAL_NET_CASH_FLOW_AMOUNT",
        };
        write!(f, "{}", name)
    }
}

/// Formula AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormulaNode {
    /// Literal rational value
    Literal(Rational),
    /// Account-set or activity reference
    Selector(SelectorSpec),
    /// Aggregate procedure call
    Call {
        /// The procedure being invoked
        procedure: Procedure,
        /// Its argument expressions
        args: Vec<FormulaNode>,
    },
    /// Binary operation
    Binary {
        /// The operator
        op: BinaryOp,
        /// Left operand
        left: Box<FormulaNode>,
        /// Right operand
        right: Box<FormulaNode>,
    },
    /// Unary negation
    Negate(Box<FormulaNode>),
}

/// Which reference time converts each slice to the destination currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateBasis {
    /// Rate as of each slice's own finish time
    Periodic,
    /// Most recent known rate regardless of slice
    Latest,
}

/// Everything one evaluation runs against
///
/// Owned by a single calculation request; nothing survives it.
pub struct EvaluationScope<'a> {
    /// Time groups in scope, in slice order
    pub groups: Vec<&'a dyn TimeGroup>,
    /// Pre-loaded account and collection records
    pub book: &'a AccountBook,
    /// Currency every result is expressed in
    pub destination_currency: CurrencyId,
    /// Observed conversion edges for rate derivation
    pub exchange_edges: &'a [ExchangeRateInfo],
    /// Evaluation reference time (the "now" of the request)
    pub reference_time: Timestamp,
    /// How conversion reference times are chosen per slice
    pub rate_basis: RateBasis,
}

/// One derivation session per distinct conversion reference time
enum RateSessions {
    Latest(ExchangeRateGraph),
    Periodic(Vec<ExchangeRateGraph>),
}

/// Evaluates formulas against one scope
pub struct Evaluator<'a> {
    scope: EvaluationScope<'a>,
    selectors: Vec<SelectorSpec>,
    slice_times: Vec<Timestamp>,
    sessions: RateSessions,
}

impl<'a> Evaluator<'a> {
    /// Evaluate a formula, producing one rational per time slice
    pub fn evaluate(
        formula_text: &str,
        scope: EvaluationScope<'a>,
    ) -> FormulaResult<Vec<Rational>> {
        debug!("evaluating formula: {}", formula_text);
        let root = parser::parse(formula_text)?;
        let mut evaluator = Self::new(scope);
        let value = evaluator.eval_node(&root)?;
        evaluator.finalize(value)
    }

    fn new(scope: EvaluationScope<'a>) -> Self {
        let slice_times: Vec<Timestamp> =
            scope.groups.iter().flat_map(|g| g.slice_finished_ats()).collect();
        let sessions = match scope.rate_basis {
            RateBasis::Latest => RateSessions::Latest(ExchangeRateGraph::new(
                scope.exchange_edges.to_vec(),
                scope.reference_time,
            )),
            // Each slice only sees observations that existed by its own
            // finish time; a rate "as of" a slice cannot use later edges.
            RateBasis::Periodic => RateSessions::Periodic(
                slice_times
                    .iter()
                    .map(|slice_time| {
                        let known: Vec<ExchangeRateInfo> = scope
                            .exchange_edges
                            .iter()
                            .filter(|edge| edge.observed_at <= *slice_time)
                            .cloned()
                            .collect();
                        ExchangeRateGraph::new(known, *slice_time)
                    })
                    .collect(),
            ),
        };
        Self { scope, selectors: Vec::new(), slice_times, sessions }
    }

    fn eval_node(&mut self, node: &FormulaNode) -> FormulaResult<Value> {
        match node {
            FormulaNode::Literal(value) => Ok(Value::Rational(value.clone())),

            FormulaNode::Selector(spec) => {
                let handle = SelectorHandle(self.selectors.len());
                self.selectors.push(spec.clone());
                Ok(Value::Selector(handle))
            }

            FormulaNode::Negate(operand) => {
                let value = self.eval_node(operand)?;
                Ok(negate(&value)?)
            }

            FormulaNode::Binary { op, left, right } => {
                let lhs = self.eval_node(left)?;
                let rhs = self.eval_node(right)?;
                Ok(apply_binary(*op, &lhs, &rhs)?)
            }

            FormulaNode::Call { procedure, args } => self.eval_call(*procedure, args),
        }
    }

    fn eval_call(&mut self, procedure: Procedure, args: &[FormulaNode]) -> FormulaResult<Value> {
        if args.len() != procedure.arity() {
            return Err(FormulaError::InvalidArgCount {
                procedure: procedure.to_string(),
                expected: procedure.arity(),
                found: args.len(),
            });
        }
        let values: Vec<Value> =
            args.iter().map(|arg| self.eval_node(arg)).collect::<FormulaResult<_>>()?;

        let series = match procedure {
            Procedure::TotalNetCashFlowAmount => {
                let activity = match self.selector_spec(&values[0])? {
                    SelectorSpec::Activity(id) => *id,
                    other => {
                        return Err(BroadcastError::UnresolvedOperand(format!(
                            "{} requires a CASH_FLOW_ACTIVITY first argument, found {:?}",
                            procedure, other
                        ))
                        .into())
                    }
                };
                let accounts = self.resolve_accounts(&values[1])?;
                self.total_series(procedure, &[activity], &accounts)?
            }
            _ => {
                let accounts = self.resolve_accounts(&values[0])?;
                self.total_series(procedure, &[], &accounts)?
            }
        };
        Ok(Value::Sequence(series))
    }

    /// The cached descriptor behind a selector value
    fn selector_spec(&self, value: &Value) -> FormulaResult<&SelectorSpec> {
        match value {
            Value::Selector(handle) => self.selectors.get(handle.0).ok_or_else(|| {
                BroadcastError::UnresolvedOperand("selector handle expired".to_string()).into()
            }),
            other => Err(BroadcastError::UnresolvedOperand(format!(
                "procedure argument must be a selector, found {}",
                other.shape_name()
            ))
            .into()),
        }
    }

    /// Concrete accounts a selector denotes
    fn resolve_accounts(&self, value: &Value) -> FormulaResult<Vec<Account>> {
        match self.selector_spec(value)? {
            SelectorSpec::Kind(kind) => Ok(self.scope.book.accounts_of_kind(*kind)),
            SelectorSpec::Collection(id) => {
                let members = self.scope.book.collection_members(*id).ok_or_else(|| {
                    FormulaError::UnknownSelector(format!("COLLECTION[{}]", id))
                })?;
                members
                    .iter()
                    .map(|member| {
                        self.scope.book.account(*member).copied().ok_or_else(|| {
                            FormulaError::UnknownSelector(format!(
                                "account {} of COLLECTION[{}]",
                                member, id
                            ))
                        })
                    })
                    .collect()
            }
            SelectorSpec::Activity(id) => Err(BroadcastError::UnresolvedOperand(format!(
                "CASH_FLOW_ACTIVITY[{}] used where accounts are required",
                id
            ))
            .into()),
        }
    }

    /// Query every group in scope and sum currency buckets in destination units
    fn total_series(
        &mut self,
        procedure: Procedure,
        activities: &[ActivityId],
        accounts: &[Account],
    ) -> FormulaResult<Vec<Rational>> {
        let mut combined = vec![Rational::zero(); self.slice_times.len()];

        let mut by_currency: BTreeMap<CurrencyId, Vec<Account>> = BTreeMap::new();
        for account in accounts {
            by_currency.entry(account.currency_id).or_default().push(*account);
        }

        for (currency, bucket) in by_currency {
            let series: Vec<Rational> = self
                .scope
                .groups
                .iter()
                .flat_map(|group| group_total(*group, procedure, activities, &bucket))
                .collect();
            let converted = self.convert(series, currency)?;
            for (slot, value) in combined.iter_mut().zip(converted) {
                *slot = slot.add(&value);
            }
        }

        Ok(combined.into_iter().map(|total| total.simplify()).collect())
    }

    /// Convert a per-slice series from one currency into the destination
    fn convert(&mut self, series: Vec<Rational>, source: CurrencyId) -> FormulaResult<Vec<Rational>> {
        let destination = self.scope.destination_currency;
        if source == destination {
            return Ok(series);
        }
        match &mut self.sessions {
            RateSessions::Latest(graph) => {
                let rate = graph.derive_rate(source, destination)?;
                Ok(series.into_iter().map(|value| value.multiply(&rate)).collect())
            }
            RateSessions::Periodic(graphs) => series
                .into_iter()
                .zip(graphs.iter_mut())
                .map(|(value, graph)| {
                    let rate = graph.derive_rate(source, destination)?;
                    Ok(value.multiply(&rate))
                })
                .collect(),
        }
    }

    /// Shape the root value into one rational per slice
    fn finalize(&self, value: Value) -> FormulaResult<Vec<Rational>> {
        match value {
            Value::Sequence(items) => {
                Ok(items.into_iter().map(|item| item.simplify()).collect())
            }
            Value::Rational(scalar) => {
                let slices = self.slice_times.len().max(1);
                Ok(vec![scalar.simplify(); slices])
            }
            Value::Selector(_) => Err(BroadcastError::UnresolvedOperand(
                "formula evaluates to a bare selector".to_string(),
            )
            .into()),
        }
    }
}

/// Dispatch one procedure against one group
fn group_total(
    group: &dyn TimeGroup,
    procedure: Procedure,
    activities: &[ActivityId],
    accounts: &[Account],
) -> Vec<Rational> {
    match procedure {
        Procedure::TotalOpenedDebitAmount => group.total_opened_debit_amount(accounts),
        Procedure::TotalOpenedCreditAmount => group.total_opened_credit_amount(accounts),
        Procedure::TotalUnadjustedDebitAmount => group.total_unadjusted_debit_amount(accounts),
        Procedure::TotalUnadjustedCreditAmount => group.total_unadjusted_credit_amount(accounts),
        Procedure::TotalClosedDebitAmount => group.total_closed_debit_amount(accounts),
        Procedure::TotalClosedCreditAmount => group.total_closed_credit_amount(accounts),
        Procedure::TotalNetCashFlowAmount => {
            group.total_net_cash_flow_amount(activities, accounts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use summa_math::day_start;

    fn empty_scope(book: &AccountBook) -> EvaluationScope<'_> {
        EvaluationScope {
            groups: Vec::new(),
            book,
            destination_currency: 1,
            exchange_edges: &[],
            reference_time: day_start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap(),
            rate_basis: RateBasis::Latest,
        }
    }

    #[test]
    fn test_scalar_formula_without_groups() {
        let book = AccountBook::new();
        let result = Evaluator::evaluate("(1 + 2) * 4", empty_scope(&book)).unwrap();
        assert_eq!(result, vec![Rational::from_i64(12)]);
    }

    #[test]
    fn test_bare_selector_root_is_unresolved() {
        let book = AccountBook::new();
        assert!(matches!(
            Evaluator::evaluate("EXPENSE_ACCOUNTS", empty_scope(&book)),
            Err(FormulaError::Broadcast(BroadcastError::UnresolvedOperand(_)))
        ));
    }

    #[test]
    fn test_procedure_arity_is_checked() {
        let book = AccountBook::new();
        assert_eq!(
            Evaluator::evaluate(
                "TOTAL_UNADJUSTED_DEBIT_AMOUNT(EXPENSE_ACCOUNTS, INCOME_ACCOUNTS)",
                empty_scope(&book)
            ),
            Err(FormulaError::InvalidArgCount {
                procedure: "TOTAL_UNADJUSTED_DEBIT_AMOUNT".to_string(),
                expected: 1,
                found: 2,
            })
        );
    }

    #[test]
    fn test_literal_procedure_argument_is_unresolved() {
        let book = AccountBook::new();
        assert!(matches!(
            Evaluator::evaluate("TOTAL_UNADJUSTED_DEBIT_AMOUNT(5)", empty_scope(&book)),
            Err(FormulaError::Broadcast(BroadcastError::UnresolvedOperand(_)))
        ));
    }

    #[test]
    fn test_unknown_collection_is_unknown_selector() {
        let book = AccountBook::new();
        assert!(matches!(
            Evaluator::evaluate("TOTAL_UNADJUSTED_DEBIT_AMOUNT(COLLECTION[9])", empty_scope(&book)),
            Err(FormulaError::UnknownSelector(_))
        ));
    }
}
