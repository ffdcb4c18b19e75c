//! Time group aggregation hierarchy
//!
//! A time group owns the summary and flow rows belonging to one span of
//! time and answers total queries over them. Three variants exist: the
//! unfrozen "live" span, a closed (frozen) period, and a yearly composite
//! that owns an ordered sequence of the other two. Every total returns one
//! rational per time slice: a single element for leaf groups, one element
//! per child for yearly groups.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use summa_math::{day_end, day_start, year_of, DateTimeResult, Rational, Timestamp};

use crate::account::{Account, AccountId, ActivityId, PeriodId};

/// A pre-loaded closed period record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrozenPeriod {
    /// Unique period identifier
    pub id: PeriodId,
    /// First instant of the period
    pub started_at: Timestamp,
    /// Last instant of the period
    pub finished_at: Timestamp,
}

impl FrozenPeriod {
    /// Create a closed period record
    pub fn new(id: PeriodId, started_at: Timestamp, finished_at: Timestamp) -> Self {
        Self { id, started_at, finished_at }
    }
}

/// The position a row is keyed under
///
/// Rows loaded from a frozen period reference an opaque frozen-account
/// hash; rows computed for the live span reference the account directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowOwner {
    /// Opaque hash of a frozen account inside some closed period
    Frozen(String),
    /// Raw account id in the unfrozen span
    Live(AccountId),
}

/// A precomputed debit/credit summary for one account in one time group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Which account position this row belongs to
    pub owner: RowOwner,
    /// Adjusted net amount at period open, in the account's natural orientation
    pub opened_amount: Rational,
    /// Total debits before adjustment
    pub unadjusted_debit_amount: Rational,
    /// Total credits before adjustment
    pub unadjusted_credit_amount: Rational,
    /// Adjusted net amount at period close, in the account's natural orientation
    pub closed_amount: Rational,
}

/// A precomputed net cash-flow amount for one account/activity pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRow {
    /// Which account position this row belongs to
    pub owner: RowOwner,
    /// The cash-flow activity this net amount belongs to
    pub activity_id: ActivityId,
    /// Net flow amount for the span
    pub net_amount: Rational,
}

/// Maps frozen-account hashes back to their owning period and account
///
/// An external collaborator: the engine never computes hashes itself, it
/// only routes rows with them.
pub trait FrozenAccountCache {
    /// The closed period a frozen account hash belongs to
    fn period_id_of(&self, hash: &str) -> Option<PeriodId>;
    /// The raw account behind a frozen account hash
    fn account_id_of(&self, hash: &str) -> Option<AccountId>;
}

/// In-memory [`FrozenAccountCache`] built from pre-loaded records
#[derive(Debug, Default, Clone)]
pub struct FrozenAccountMap {
    entries: HashMap<String, (PeriodId, AccountId)>,
}

impl FrozenAccountMap {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one frozen account hash
    pub fn add_entry(
        &mut self,
        hash: impl Into<String>,
        period_id: PeriodId,
        account_id: AccountId,
    ) {
        self.entries.insert(hash.into(), (period_id, account_id));
    }
}

impl FrozenAccountCache for FrozenAccountMap {
    fn period_id_of(&self, hash: &str) -> Option<PeriodId> {
        self.entries.get(hash).map(|(period, _)| *period)
    }

    fn account_id_of(&self, hash: &str) -> Option<AccountId> {
        self.entries.get(hash).map(|(_, account)| *account)
    }
}

/// Uniform query surface over the three time group variants
///
/// Absent rows total to zero; absence means "no activity in this span",
/// never an invalid account. A group's variant is fixed at construction.
pub trait TimeGroup {
    /// First instant of this group's span
    fn started_at(&self) -> Timestamp;
    /// Last instant of this group's span
    fn finished_at(&self) -> Timestamp;
    /// Finish of the most recent closed period in this group, if any
    fn last_frozen_at(&self) -> Option<Timestamp>;
    /// Ids of every closed period this group covers
    fn frozen_period_ids(&self) -> Vec<PeriodId>;
    /// One finish timestamp per time slice this group produces
    fn slice_finished_ats(&self) -> Vec<Timestamp>;

    /// Number of time slices this group's totals contain
    fn slice_count(&self) -> usize {
        self.slice_finished_ats().len()
    }

    /// Add a summary row, routing it to the owning span
    ///
    /// Returns false when the row does not belong to this group.
    fn add_summary_row(&mut self, row: SummaryRow, cache: &dyn FrozenAccountCache) -> bool;

    /// Add a flow row, routing it to the owning span
    fn add_flow_row(&mut self, row: FlowRow, cache: &dyn FrozenAccountCache) -> bool;

    /// Total adjusted opened amount viewed from the debit side
    fn total_opened_debit_amount(&self, accounts: &[Account]) -> Vec<Rational>;
    /// Total adjusted opened amount viewed from the credit side
    fn total_opened_credit_amount(&self, accounts: &[Account]) -> Vec<Rational>;
    /// Total debits before adjustment
    fn total_unadjusted_debit_amount(&self, accounts: &[Account]) -> Vec<Rational>;
    /// Total credits before adjustment
    fn total_unadjusted_credit_amount(&self, accounts: &[Account]) -> Vec<Rational>;
    /// Total adjusted closed amount viewed from the debit side
    fn total_closed_debit_amount(&self, accounts: &[Account]) -> Vec<Rational>;
    /// Total adjusted closed amount viewed from the credit side
    fn total_closed_credit_amount(&self, accounts: &[Account]) -> Vec<Rational>;
    /// Total net cash flow for the given activities and accounts
    fn total_net_cash_flow_amount(
        &self,
        activities: &[ActivityId],
        accounts: &[Account],
    ) -> Vec<Rational>;
}

/// Stored amounts of one summary row, keyed by resolved account id
#[derive(Debug, Clone, Default)]
struct StoredSummary {
    opened: Rational,
    unadjusted_debit: Rational,
    unadjusted_credit: Rational,
    closed: Rational,
}

/// Row storage shared by the two leaf variants
#[derive(Debug, Clone, Default)]
struct RowStore {
    summaries: HashMap<AccountId, StoredSummary>,
    flows: HashMap<(ActivityId, AccountId), Rational>,
}

/// Which side a kind-oriented total is viewed from
#[derive(Clone, Copy, PartialEq)]
enum Side {
    Debit,
    Credit,
}

impl RowStore {
    fn insert_summary(&mut self, account_id: AccountId, row: &SummaryRow) {
        self.summaries.insert(
            account_id,
            StoredSummary {
                opened: row.opened_amount.clone(),
                unadjusted_debit: row.unadjusted_debit_amount.clone(),
                unadjusted_credit: row.unadjusted_credit_amount.clone(),
                closed: row.closed_amount.clone(),
            },
        );
    }

    fn insert_flow(&mut self, account_id: AccountId, row: &FlowRow) {
        self.flows.insert((row.activity_id, account_id), row.net_amount.clone());
    }

    /// Net opened/closed amounts oriented by account kind: debit-natured
    /// accounts contribute positively to the debit view, all others negate.
    fn oriented_total<F>(&self, accounts: &[Account], side: Side, amount: F) -> Rational
    where
        F: Fn(&StoredSummary) -> &Rational,
    {
        let mut total = Rational::zero();
        for account in accounts {
            let Some(summary) = self.summaries.get(&account.id) else {
                continue;
            };
            let natural_debit = account.kind.is_debit_natured();
            let positive = match side {
                Side::Debit => natural_debit,
                Side::Credit => !natural_debit,
            };
            if positive {
                total = total.add(amount(summary));
            } else {
                total = total.subtract(amount(summary));
            }
        }
        total.simplify()
    }

    fn straight_total<F>(&self, accounts: &[Account], amount: F) -> Rational
    where
        F: Fn(&StoredSummary) -> &Rational,
    {
        let mut total = Rational::zero();
        for account in accounts {
            if let Some(summary) = self.summaries.get(&account.id) {
                total = total.add(amount(summary));
            }
        }
        total.simplify()
    }

    fn flow_total(&self, activities: &[ActivityId], accounts: &[Account]) -> Rational {
        let mut total = Rational::zero();
        for activity in activities {
            for account in accounts {
                if let Some(amount) = self.flows.get(&(*activity, account.id)) {
                    total = total.add(amount);
                }
            }
        }
        total.simplify()
    }
}

/// The live, not-yet-frozen span of one calculation run
#[derive(Debug, Clone)]
pub struct UnfrozenTimeGroup {
    started_at: Timestamp,
    finished_at: Timestamp,
    rows: RowStore,
}

impl UnfrozenTimeGroup {
    /// Create the live span from inclusive dates, normalized to day bounds
    pub fn new(start_date: NaiveDate, finish_date: NaiveDate) -> DateTimeResult<Self> {
        Ok(Self {
            started_at: day_start(start_date)?,
            finished_at: day_end(finish_date)?,
            rows: RowStore::default(),
        })
    }
}

impl TimeGroup for UnfrozenTimeGroup {
    fn started_at(&self) -> Timestamp {
        self.started_at
    }

    fn finished_at(&self) -> Timestamp {
        self.finished_at
    }

    fn last_frozen_at(&self) -> Option<Timestamp> {
        None
    }

    fn frozen_period_ids(&self) -> Vec<PeriodId> {
        Vec::new()
    }

    fn slice_finished_ats(&self) -> Vec<Timestamp> {
        vec![self.finished_at]
    }

    fn add_summary_row(&mut self, row: SummaryRow, _cache: &dyn FrozenAccountCache) -> bool {
        match &row.owner {
            RowOwner::Live(account_id) => {
                let account_id = *account_id;
                self.rows.insert_summary(account_id, &row);
                true
            }
            RowOwner::Frozen(_) => false,
        }
    }

    fn add_flow_row(&mut self, row: FlowRow, _cache: &dyn FrozenAccountCache) -> bool {
        match &row.owner {
            RowOwner::Live(account_id) => {
                let account_id = *account_id;
                self.rows.insert_flow(account_id, &row);
                true
            }
            RowOwner::Frozen(_) => false,
        }
    }

    fn total_opened_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.oriented_total(accounts, Side::Debit, |s| &s.opened)]
    }

    fn total_opened_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.oriented_total(accounts, Side::Credit, |s| &s.opened)]
    }

    fn total_unadjusted_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.straight_total(accounts, |s| &s.unadjusted_debit)]
    }

    fn total_unadjusted_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.straight_total(accounts, |s| &s.unadjusted_credit)]
    }

    fn total_closed_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.oriented_total(accounts, Side::Debit, |s| &s.closed)]
    }

    fn total_closed_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.oriented_total(accounts, Side::Credit, |s| &s.closed)]
    }

    fn total_net_cash_flow_amount(
        &self,
        activities: &[ActivityId],
        accounts: &[Account],
    ) -> Vec<Rational> {
        vec![self.rows.flow_total(activities, accounts)]
    }
}

/// One closed period's span
#[derive(Debug, Clone)]
pub struct PeriodicTimeGroup {
    period: FrozenPeriod,
    rows: RowStore,
}

impl PeriodicTimeGroup {
    /// Wrap one closed period record
    pub fn new(period: FrozenPeriod) -> Self {
        Self { period, rows: RowStore::default() }
    }

    /// The wrapped period's id
    pub fn period_id(&self) -> PeriodId {
        self.period.id
    }

    fn resolve_owner(
        &self,
        owner: &RowOwner,
        cache: &dyn FrozenAccountCache,
    ) -> Option<AccountId> {
        match owner {
            RowOwner::Frozen(hash) => {
                if cache.period_id_of(hash) != Some(self.period.id) {
                    return None;
                }
                cache.account_id_of(hash)
            }
            RowOwner::Live(_) => None,
        }
    }
}

impl TimeGroup for PeriodicTimeGroup {
    fn started_at(&self) -> Timestamp {
        self.period.started_at
    }

    fn finished_at(&self) -> Timestamp {
        self.period.finished_at
    }

    fn last_frozen_at(&self) -> Option<Timestamp> {
        Some(self.period.finished_at)
    }

    fn frozen_period_ids(&self) -> Vec<PeriodId> {
        vec![self.period.id]
    }

    fn slice_finished_ats(&self) -> Vec<Timestamp> {
        vec![self.period.finished_at]
    }

    fn add_summary_row(&mut self, row: SummaryRow, cache: &dyn FrozenAccountCache) -> bool {
        match self.resolve_owner(&row.owner, cache) {
            Some(account_id) => {
                self.rows.insert_summary(account_id, &row);
                true
            }
            None => false,
        }
    }

    fn add_flow_row(&mut self, row: FlowRow, cache: &dyn FrozenAccountCache) -> bool {
        match self.resolve_owner(&row.owner, cache) {
            Some(account_id) => {
                self.rows.insert_flow(account_id, &row);
                true
            }
            None => false,
        }
    }

    fn total_opened_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.oriented_total(accounts, Side::Debit, |s| &s.opened)]
    }

    fn total_opened_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.oriented_total(accounts, Side::Credit, |s| &s.opened)]
    }

    fn total_unadjusted_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.straight_total(accounts, |s| &s.unadjusted_debit)]
    }

    fn total_unadjusted_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.straight_total(accounts, |s| &s.unadjusted_credit)]
    }

    fn total_closed_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.oriented_total(accounts, Side::Debit, |s| &s.closed)]
    }

    fn total_closed_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        vec![self.rows.oriented_total(accounts, Side::Credit, |s| &s.closed)]
    }

    fn total_net_cash_flow_amount(
        &self,
        activities: &[ActivityId],
        accounts: &[Account],
    ) -> Vec<Rational> {
        vec![self.rows.flow_total(activities, accounts)]
    }
}

/// Which bound of a child decides its calendar year and sort position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBasis {
    /// Use each child's start timestamp
    Start,
    /// Use each child's finish timestamp
    Finish,
}

/// A calendar year owning an ordered sequence of child groups
pub struct YearlyTimeGroup {
    year: i32,
    basis: SortBasis,
    year_started_at: Timestamp,
    year_finished_at: Timestamp,
    children: Vec<Box<dyn TimeGroup>>,
}

impl YearlyTimeGroup {
    /// Create an empty yearly group for one calendar year
    pub fn new(year: i32, basis: SortBasis) -> DateTimeResult<Self> {
        let january_first = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| summa_math::DateTimeError::OutOfRange(year.to_string()))?;
        let december_last = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| summa_math::DateTimeError::OutOfRange(year.to_string()))?;
        Ok(Self {
            year,
            basis,
            year_started_at: day_start(january_first)?,
            year_finished_at: day_end(december_last)?,
            children: Vec::new(),
        })
    }

    /// The calendar year this group covers
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Number of owned children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    fn basis_time(&self, child: &dyn TimeGroup) -> Timestamp {
        match self.basis {
            SortBasis::Start => child.started_at(),
            SortBasis::Finish => child.finished_at(),
        }
    }

    /// Adopt a child group if its basis date falls in this year
    ///
    /// Children stay sorted ascending by the basis timestamp; insertion is
    /// a linear scan with a splice, which is fine at periods-per-year
    /// counts. A rejected child is handed back.
    pub fn add_time_group(
        &mut self,
        child: Box<dyn TimeGroup>,
    ) -> Result<(), Box<dyn TimeGroup>> {
        let candidate_time = self.basis_time(child.as_ref());
        if year_of(&candidate_time) != self.year {
            return Err(child);
        }
        let position = self
            .children
            .iter()
            .position(|existing| self.basis_time(existing.as_ref()) > candidate_time)
            .unwrap_or(self.children.len());
        self.children.insert(position, child);
        Ok(())
    }
}

impl TimeGroup for YearlyTimeGroup {
    fn started_at(&self) -> Timestamp {
        self.children.first().map(|c| c.started_at()).unwrap_or(self.year_started_at)
    }

    fn finished_at(&self) -> Timestamp {
        self.children.last().map(|c| c.finished_at()).unwrap_or(self.year_finished_at)
    }

    fn last_frozen_at(&self) -> Option<Timestamp> {
        self.children.iter().filter_map(|c| c.last_frozen_at()).max()
    }

    fn frozen_period_ids(&self) -> Vec<PeriodId> {
        self.children.iter().flat_map(|c| c.frozen_period_ids()).collect()
    }

    fn slice_finished_ats(&self) -> Vec<Timestamp> {
        self.children.iter().flat_map(|c| c.slice_finished_ats()).collect()
    }

    fn add_summary_row(&mut self, row: SummaryRow, cache: &dyn FrozenAccountCache) -> bool {
        match &row.owner {
            RowOwner::Frozen(hash) => {
                let Some(period_id) = cache.period_id_of(hash) else {
                    return false;
                };
                for child in &mut self.children {
                    if child.frozen_period_ids().contains(&period_id) {
                        return child.add_summary_row(row, cache);
                    }
                }
                false
            }
            RowOwner::Live(_) => {
                for child in &mut self.children {
                    if child.last_frozen_at().is_none() {
                        return child.add_summary_row(row, cache);
                    }
                }
                false
            }
        }
    }

    fn add_flow_row(&mut self, row: FlowRow, cache: &dyn FrozenAccountCache) -> bool {
        match &row.owner {
            RowOwner::Frozen(hash) => {
                let Some(period_id) = cache.period_id_of(hash) else {
                    return false;
                };
                for child in &mut self.children {
                    if child.frozen_period_ids().contains(&period_id) {
                        return child.add_flow_row(row, cache);
                    }
                }
                false
            }
            RowOwner::Live(_) => {
                for child in &mut self.children {
                    if child.last_frozen_at().is_none() {
                        return child.add_flow_row(row, cache);
                    }
                }
                false
            }
        }
    }

    fn total_opened_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        self.children.iter().flat_map(|c| c.total_opened_debit_amount(accounts)).collect()
    }

    fn total_opened_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        self.children.iter().flat_map(|c| c.total_opened_credit_amount(accounts)).collect()
    }

    fn total_unadjusted_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        self.children.iter().flat_map(|c| c.total_unadjusted_debit_amount(accounts)).collect()
    }

    fn total_unadjusted_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        self.children.iter().flat_map(|c| c.total_unadjusted_credit_amount(accounts)).collect()
    }

    fn total_closed_debit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        self.children.iter().flat_map(|c| c.total_closed_debit_amount(accounts)).collect()
    }

    fn total_closed_credit_amount(&self, accounts: &[Account]) -> Vec<Rational> {
        self.children.iter().flat_map(|c| c.total_closed_credit_amount(accounts)).collect()
    }

    fn total_net_cash_flow_amount(
        &self,
        activities: &[ActivityId],
        accounts: &[Account],
    ) -> Vec<Rational> {
        self.children
            .iter()
            .flat_map(|c| c.total_net_cash_flow_amount(activities, accounts))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKind;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn period(id: PeriodId, year: i32, month: u32) -> FrozenPeriod {
        let start = date(year, month, 1);
        let finish = date(year, month, 28);
        FrozenPeriod::new(id, day_start(start).unwrap(), day_end(finish).unwrap())
    }

    fn summary(owner: RowOwner, opened: i64, debit: i64, credit: i64, closed: i64) -> SummaryRow {
        SummaryRow {
            owner,
            opened_amount: Rational::from_i64(opened),
            unadjusted_debit_amount: Rational::from_i64(debit),
            unadjusted_credit_amount: Rational::from_i64(credit),
            closed_amount: Rational::from_i64(closed),
        }
    }

    #[test]
    fn test_absent_account_totals_to_zero() {
        let group = UnfrozenTimeGroup::new(date(2023, 1, 1), date(2023, 1, 31)).unwrap();
        let stranger = Account::new(42, 1, AccountKind::Asset);
        assert_eq!(group.total_unadjusted_debit_amount(&[stranger]), vec![Rational::zero()]);
        assert_eq!(
            group.total_net_cash_flow_amount(&[1], &[stranger]),
            vec![Rational::zero()]
        );
    }

    #[test]
    fn test_unfrozen_bounds_normalized_to_day() {
        let group = UnfrozenTimeGroup::new(date(2023, 1, 5), date(2023, 1, 9)).unwrap();
        assert_eq!(summa_math::format_timestamp(&group.started_at()), "2023-01-05 00:00:00");
        assert_eq!(summa_math::format_timestamp(&group.finished_at()), "2023-01-09 23:59:59");
        assert_eq!(group.last_frozen_at(), None);
        assert_eq!(group.slice_count(), 1);
    }

    #[test]
    fn test_unfrozen_rejects_frozen_rows() {
        let mut group = UnfrozenTimeGroup::new(date(2023, 1, 1), date(2023, 1, 31)).unwrap();
        let cache = FrozenAccountMap::new();
        assert!(!group.add_summary_row(summary(RowOwner::Frozen("abc".into()), 0, 1, 1, 0), &cache));
        assert!(group.add_summary_row(summary(RowOwner::Live(7), 0, 1, 1, 0), &cache));
    }

    #[test]
    fn test_kind_orients_opened_and_closed_totals() {
        let mut group = UnfrozenTimeGroup::new(date(2023, 1, 1), date(2023, 1, 31)).unwrap();
        let cache = FrozenAccountMap::new();
        let asset = Account::new(1, 1, AccountKind::Asset);
        let income = Account::new(2, 1, AccountKind::Income);
        group.add_summary_row(summary(RowOwner::Live(1), 100, 0, 0, 130), &cache);
        group.add_summary_row(summary(RowOwner::Live(2), 40, 0, 0, 70), &cache);

        // Asset contributes positively to the debit view, income negates.
        assert_eq!(
            group.total_opened_debit_amount(&[asset, income]),
            vec![Rational::from_i64(60)]
        );
        assert_eq!(
            group.total_opened_credit_amount(&[asset, income]),
            vec![Rational::from_i64(-60)]
        );
        assert_eq!(
            group.total_closed_debit_amount(&[asset, income]),
            vec![Rational::from_i64(60)]
        );
    }

    #[test]
    fn test_unadjusted_totals_are_straight_sums() {
        let mut group = UnfrozenTimeGroup::new(date(2023, 1, 1), date(2023, 1, 31)).unwrap();
        let cache = FrozenAccountMap::new();
        let asset = Account::new(1, 1, AccountKind::Asset);
        let income = Account::new(2, 1, AccountKind::Income);
        group.add_summary_row(summary(RowOwner::Live(1), 0, 25, 10, 0), &cache);
        group.add_summary_row(summary(RowOwner::Live(2), 0, 5, 30, 0), &cache);

        assert_eq!(
            group.total_unadjusted_debit_amount(&[asset, income]),
            vec![Rational::from_i64(30)]
        );
        assert_eq!(
            group.total_unadjusted_credit_amount(&[asset, income]),
            vec![Rational::from_i64(40)]
        );
    }

    #[test]
    fn test_periodic_routes_by_cache() {
        let mut group = PeriodicTimeGroup::new(period(11, 2023, 3));
        let mut cache = FrozenAccountMap::new();
        cache.add_entry("hash-a", 11, 5);
        cache.add_entry("hash-b", 12, 5);

        assert!(group.add_summary_row(summary(RowOwner::Frozen("hash-a".into()), 0, 8, 0, 0), &cache));
        // Belongs to period 12, not this group.
        assert!(!group.add_summary_row(summary(RowOwner::Frozen("hash-b".into()), 0, 9, 0, 0), &cache));
        // Unknown hash.
        assert!(!group.add_summary_row(summary(RowOwner::Frozen("hash-x".into()), 0, 9, 0, 0), &cache));
        // Live rows never belong to a closed period.
        assert!(!group.add_summary_row(summary(RowOwner::Live(5), 0, 9, 0, 0), &cache));

        let account = Account::new(5, 1, AccountKind::Asset);
        assert_eq!(group.total_unadjusted_debit_amount(&[account]), vec![Rational::from_i64(8)]);
        assert_eq!(group.last_frozen_at(), Some(group.finished_at()));
    }

    #[test]
    fn test_yearly_insertion_keeps_sorted_order() {
        let mut yearly = YearlyTimeGroup::new(2023, SortBasis::Start).unwrap();
        assert!(yearly.add_time_group(Box::new(PeriodicTimeGroup::new(period(3, 2023, 9)))).is_ok());
        assert!(yearly.add_time_group(Box::new(PeriodicTimeGroup::new(period(1, 2023, 2)))).is_ok());
        assert!(yearly.add_time_group(Box::new(PeriodicTimeGroup::new(period(2, 2023, 5)))).is_ok());

        assert_eq!(yearly.frozen_period_ids(), vec![1, 2, 3]);
        assert_eq!(yearly.slice_count(), 3);
    }

    #[test]
    fn test_yearly_rejects_other_years() {
        let mut yearly = YearlyTimeGroup::new(2023, SortBasis::Start).unwrap();
        let rejected = yearly.add_time_group(Box::new(PeriodicTimeGroup::new(period(9, 2022, 11))));
        assert!(rejected.is_err());
        assert_eq!(yearly.child_count(), 0);
    }

    #[test]
    fn test_yearly_routes_rows_and_slices_totals() {
        let mut yearly = YearlyTimeGroup::new(2023, SortBasis::Start).unwrap();
        yearly
            .add_time_group(Box::new(PeriodicTimeGroup::new(period(1, 2023, 2))))
            .ok()
            .unwrap();
        yearly
            .add_time_group(Box::new(
                UnfrozenTimeGroup::new(date(2023, 3, 1), date(2023, 3, 31)).unwrap(),
            ))
            .ok()
            .unwrap();

        let mut cache = FrozenAccountMap::new();
        cache.add_entry("hash-a", 1, 5);

        assert!(yearly.add_summary_row(summary(RowOwner::Frozen("hash-a".into()), 0, 8, 0, 0), &cache));
        assert!(yearly.add_summary_row(summary(RowOwner::Live(5), 0, 3, 0, 0), &cache));
        // No child owns period 99.
        let mut unknown_cache = FrozenAccountMap::new();
        unknown_cache.add_entry("hash-z", 99, 5);
        assert!(!yearly.add_summary_row(
            summary(RowOwner::Frozen("hash-z".into()), 0, 1, 0, 0),
            &unknown_cache
        ));

        let account = Account::new(5, 1, AccountKind::Asset);
        assert_eq!(
            yearly.total_unadjusted_debit_amount(&[account]),
            vec![Rational::from_i64(8), Rational::from_i64(3)]
        );
    }

    #[test]
    fn test_yearly_flow_rows_route_like_summaries() {
        let mut yearly = YearlyTimeGroup::new(2023, SortBasis::Finish).unwrap();
        yearly
            .add_time_group(Box::new(PeriodicTimeGroup::new(period(1, 2023, 2))))
            .ok()
            .unwrap();
        let mut cache = FrozenAccountMap::new();
        cache.add_entry("hash-a", 1, 5);

        let flow = FlowRow {
            owner: RowOwner::Frozen("hash-a".into()),
            activity_id: 2,
            net_amount: Rational::from_i64(12),
        };
        assert!(yearly.add_flow_row(flow, &cache));

        let account = Account::new(5, 1, AccountKind::Asset);
        assert_eq!(
            yearly.total_net_cash_flow_amount(&[2], &[account]),
            vec![Rational::from_i64(12)]
        );
        // A different activity totals to zero.
        assert_eq!(
            yearly.total_net_cash_flow_amount(&[3], &[account]),
            vec![Rational::zero()]
        );
    }
}
