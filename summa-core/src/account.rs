//! Account, collection, and currency records
//!
//! The engine never loads these itself; callers hand it records that were
//! already fetched and authorized upstream. This module holds the record
//! types plus the per-request registry the formula layer resolves selectors
//! against.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier for an account record
pub type AccountId = u64;
/// Identifier for a currency record
pub type CurrencyId = u64;
/// Identifier for an account collection
pub type CollectionId = u64;
/// Identifier for a closed (frozen) period
pub type PeriodId = u64;
/// Identifier for a cash-flow activity
pub type ActivityId = u64;

/// Account type classification for double-entry semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    /// Asset account (normally debit balance)
    Asset,
    /// Liability account (normally credit balance)
    Liability,
    /// Equity account (normally credit balance)
    Equity,
    /// Income account (normally credit balance)
    Income,
    /// Expense account (normally debit balance)
    Expense,
}

impl AccountKind {
    /// Whether accounts of this kind carry a normal debit balance
    pub fn is_debit_natured(&self) -> bool {
        matches!(self, AccountKind::Asset | AccountKind::Expense)
    }
}

/// A pre-loaded account record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier
    pub id: AccountId,
    /// Currency every amount on this account is denominated in
    pub currency_id: CurrencyId,
    /// Double-entry classification
    pub kind: AccountKind,
}

impl Account {
    /// Create an account record
    pub fn new(id: AccountId, currency_id: CurrencyId, kind: AccountKind) -> Self {
        Self { id, currency_id, kind }
    }
}

/// Per-request registry of accounts and collection membership
///
/// Built once per calculation run from pre-loaded records and discarded at
/// its end; nothing here persists across requests.
#[derive(Debug, Default, Clone)]
pub struct AccountBook {
    accounts: HashMap<AccountId, Account>,
    collections: HashMap<CollectionId, Vec<AccountId>>,
}

impl AccountBook {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account record
    pub fn add_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Register one member of a collection
    pub fn add_collection_member(&mut self, collection_id: CollectionId, account_id: AccountId) {
        let members = self.collections.entry(collection_id).or_default();
        if !members.contains(&account_id) {
            members.push(account_id);
        }
    }

    /// Look up an account by id
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    /// All registered accounts of the given kind
    pub fn accounts_of_kind(&self, kind: AccountKind) -> Vec<Account> {
        let mut matched: Vec<Account> =
            self.accounts.values().filter(|a| a.kind == kind).copied().collect();
        matched.sort_by_key(|a| a.id);
        matched
    }

    /// Member account ids of a collection, if the collection is known
    pub fn collection_members(&self, id: CollectionId) -> Option<&[AccountId]> {
        self.collections.get(&id).map(|m| m.as_slice())
    }
}
