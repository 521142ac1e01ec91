use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::ids::{AccountNumber, OwnerId, TransactionId};
use crate::models::{Account, AccountPatch, TransactionRecord};

/// Failures raised by a persistence backend.
///
/// The duplicate variants double as the uniqueness check for generated
/// identifiers: insert-or-fail is atomic, so callers regenerate and retry
/// instead of racing a separate lookup.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("account number already in use")]
    DuplicateAccount,
    #[error("transaction id already in use")]
    DuplicateTransaction,
    #[error("account does not exist")]
    MissingAccount,
    #[error("journal i/o failed")]
    Journal(#[from] std::io::Error),
    #[error("journal entry malformed")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Durable storage boundary for accounts and ledger entries.
///
/// Implementations must guarantee:
/// - `insert_account` and `commit_transaction` are atomic insert-or-fail
///   operations (never overwrite on identifier collision);
/// - `commit_transaction` persists the ledger record and the new balance
///   (with `updated_at` taken from the record's timestamp) all-or-nothing;
/// - `update_metadata` touches only `name`, `kind` and `updated_at`, never
///   the balance;
/// - listing methods return entries newest-first (reverse insertion
///   order; per-account commits are serialized upstream, so insertion
///   order is chronological).
#[async_trait]
pub trait BankStore: Send + Sync {
    async fn insert_account(&self, account: Account) -> Result<(), StoreError>;

    async fn account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError>;

    async fn accounts_for_owner(&self, owner: &OwnerId) -> Result<Vec<Account>, StoreError>;

    async fn update_metadata(
        &self,
        number: &AccountNumber,
        patch: AccountPatch,
        at: DateTime<Utc>,
    ) -> Result<Account, StoreError>;

    /// Atomically insert `record` and move the account balance to
    /// `new_balance`, stamping `updated_at` with the record's timestamp.
    async fn commit_transaction(
        &self,
        record: TransactionRecord,
        new_balance: Decimal,
    ) -> Result<(), StoreError>;

    async fn transaction(
        &self,
        number: &AccountNumber,
        id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, StoreError>;

    async fn transactions_for_account(
        &self,
        number: &AccountNumber,
    ) -> Result<Vec<TransactionRecord>, StoreError>;
}

/// The pure state machine shared by [`MemoryStore`] and the journaled
/// store: maps plus the insertion orders that back newest-first listing.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    accounts: HashMap<AccountNumber, Account>,
    account_order: Vec<AccountNumber>,
    ledgers: HashMap<AccountNumber, Vec<TransactionRecord>>,
    transaction_ids: HashSet<TransactionId>,
}

impl StoreState {
    pub(crate) fn insert_account(&mut self, account: Account) -> Result<(), StoreError> {
        if self.accounts.contains_key(&account.number) {
            return Err(StoreError::DuplicateAccount);
        }
        self.account_order.push(account.number.clone());
        self.accounts.insert(account.number.clone(), account);
        Ok(())
    }

    pub(crate) fn account(&self, number: &AccountNumber) -> Option<Account> {
        self.accounts.get(number).cloned()
    }

    pub(crate) fn accounts_for_owner(&self, owner: &OwnerId) -> Vec<Account> {
        self.account_order
            .iter()
            .rev()
            .filter_map(|number| self.accounts.get(number))
            .filter(|account| account.owner == *owner)
            .cloned()
            .collect()
    }

    pub(crate) fn update_metadata(
        &mut self,
        number: &AccountNumber,
        patch: &AccountPatch,
        at: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        let account = self
            .accounts
            .get_mut(number)
            .ok_or(StoreError::MissingAccount)?;
        if patch.is_empty() {
            return Ok(account.clone());
        }
        if let Some(name) = &patch.name {
            account.name = name.clone();
        }
        if let Some(kind) = patch.kind {
            account.kind = kind;
        }
        account.updated_at = at;
        Ok(account.clone())
    }

    pub(crate) fn commit_transaction(
        &mut self,
        record: TransactionRecord,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        if self.transaction_ids.contains(&record.id) {
            return Err(StoreError::DuplicateTransaction);
        }
        let account = self
            .accounts
            .get_mut(&record.account)
            .ok_or(StoreError::MissingAccount)?;
        account.balance = new_balance;
        account.updated_at = record.created_at;
        self.transaction_ids.insert(record.id.clone());
        self.ledgers
            .entry(record.account.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    /// Pre-flight the checks of [`Self::commit_transaction`] without
    /// mutating anything. Used by the journaled store to validate before
    /// the journal append.
    pub(crate) fn check_commit(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        if self.transaction_ids.contains(&record.id) {
            return Err(StoreError::DuplicateTransaction);
        }
        if !self.accounts.contains_key(&record.account) {
            return Err(StoreError::MissingAccount);
        }
        Ok(())
    }

    pub(crate) fn contains_account(&self, number: &AccountNumber) -> bool {
        self.accounts.contains_key(number)
    }

    pub(crate) fn transaction(
        &self,
        number: &AccountNumber,
        id: &TransactionId,
    ) -> Option<TransactionRecord> {
        self.ledgers
            .get(number)?
            .iter()
            .find(|record| record.id == *id)
            .cloned()
    }

    pub(crate) fn transactions_for_account(
        &self,
        number: &AccountNumber,
    ) -> Vec<TransactionRecord> {
        self.ledgers
            .get(number)
            .map(|records| records.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

/// In-memory backend: the state machine behind a `tokio` read-write lock.
/// Used by the replay driver, tests and benches; the journaled store adds
/// durability on the same state machine.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BankStore for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        self.state.write().await.insert_account(account)
    }

    async fn account(&self, number: &AccountNumber) -> Result<Option<Account>, StoreError> {
        Ok(self.state.read().await.account(number))
    }

    async fn accounts_for_owner(&self, owner: &OwnerId) -> Result<Vec<Account>, StoreError> {
        Ok(self.state.read().await.accounts_for_owner(owner))
    }

    async fn update_metadata(
        &self,
        number: &AccountNumber,
        patch: AccountPatch,
        at: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        self.state.write().await.update_metadata(number, &patch, at)
    }

    async fn commit_transaction(
        &self,
        record: TransactionRecord,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .commit_transaction(record, new_balance)
    }

    async fn transaction(
        &self,
        number: &AccountNumber,
        id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.state.read().await.transaction(number, id))
    }

    async fn transactions_for_account(
        &self,
        number: &AccountNumber,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self.state.read().await.transactions_for_account(number))
    }
}
