use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use crate::config::CoreConfig;
use crate::errors::{CoreError, ValidationError};
use crate::gate;
use crate::ids::{AccountNumber, OwnerId, TransactionId};
use crate::models::{Account, AccountPatch, NewAccount, TransactionRecord, TransactionRequest};
use crate::shards::ShardRouter;
use crate::storage::{BankStore, StoreError};

/// Bound on regenerate-and-retry when a candidate account number is
/// already taken. The number space is a million entries, so a dense
/// book needs real headroom here.
const ACCOUNT_NUMBER_ATTEMPTS: usize = 64;

/// Front door for every account and ledger operation.
///
/// Reads go straight to the store. Balance-mutating requests are
/// validated and authorized here, then forwarded to the per-account
/// worker that serializes them.
#[derive(Clone)]
pub struct TransactionEngine {
    store: Arc<dyn BankStore>,
    router: Arc<ShardRouter>,
    config: Arc<CoreConfig>,
}

impl TransactionEngine {
    pub fn new(store: Arc<dyn BankStore>, config: CoreConfig) -> Self {
        let router = Arc::new(ShardRouter::new(store.clone(), &config));
        Self {
            store,
            router,
            config: Arc::new(config),
        }
    }

    /// Open a new account owned by the requesting customer.
    ///
    /// The account number is generated here; collisions with existing
    /// numbers are resolved by regenerating.
    pub async fn create_account(&self, request: NewAccount) -> Result<Account, CoreError> {
        for _ in 0..ACCOUNT_NUMBER_ATTEMPTS {
            let now = Utc::now();
            let account = Account {
                number: AccountNumber::random(),
                owner: request.owner.clone(),
                name: request.name.clone(),
                kind: request.kind,
                balance: Decimal::ZERO,
                currency: self.config.currency.clone(),
                created_at: now,
                updated_at: now,
            };
            match self.store.insert_account(account.clone()).await {
                Ok(()) => {
                    info!(account = %account.number, owner = %account.owner, "account opened");
                    return Ok(account);
                }
                Err(StoreError::DuplicateAccount) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(CoreError::Persistence(anyhow::anyhow!(
            "no unique account number after {ACCOUNT_NUMBER_ATTEMPTS} attempts"
        )))
    }

    /// Fetch one account, visible to its owner only.
    pub async fn account(
        &self,
        number: &AccountNumber,
        caller: &OwnerId,
    ) -> Result<Account, CoreError> {
        gate::authorize(self.store.as_ref(), number, caller).await
    }

    /// List the caller's accounts, most recently opened first.
    pub async fn accounts(&self, caller: &OwnerId) -> Result<Vec<Account>, CoreError> {
        Ok(self.store.accounts_for_owner(caller).await?)
    }

    /// Rename or re-classify an account. Balance and ledger are never
    /// touched by this path.
    pub async fn update_metadata(
        &self,
        number: &AccountNumber,
        caller: &OwnerId,
        patch: AccountPatch,
    ) -> Result<Account, CoreError> {
        let account = gate::authorize(self.store.as_ref(), number, caller).await?;
        if patch.is_empty() {
            return Ok(account);
        }
        Ok(self.store.update_metadata(number, patch, Utc::now()).await?)
    }

    /// Apply a deposit or withdrawal and return the recorded ledger entry.
    pub async fn apply(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionRecord, CoreError> {
        // Amount checks come first so a malformed request learns nothing
        // about whether the account exists.
        validate_amount(request.amount, self.config.max_transaction_amount)?;
        gate::authorize(self.store.as_ref(), &request.account, &request.caller).await?;
        self.router.apply(request).await
    }

    /// List an account's ledger entries, most recent first.
    pub async fn transactions(
        &self,
        number: &AccountNumber,
        caller: &OwnerId,
    ) -> Result<Vec<TransactionRecord>, CoreError> {
        gate::authorize(self.store.as_ref(), number, caller).await?;
        Ok(self.store.transactions_for_account(number).await?)
    }

    /// Fetch one ledger entry. The lookup is scoped to the named
    /// account, so an id recorded elsewhere reads as absent.
    pub async fn transaction(
        &self,
        number: &AccountNumber,
        caller: &OwnerId,
        id: &TransactionId,
    ) -> Result<TransactionRecord, CoreError> {
        gate::authorize(self.store.as_ref(), number, caller).await?;
        self.store
            .transaction(number, id)
            .await?
            .ok_or(CoreError::NotFound)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}

fn validate_amount(amount: Decimal, limit: Decimal) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount);
    }
    // normalize() drops trailing zeros, so 5.10 passes and 5.101 fails
    if amount.normalize().scale() > 2 {
        return Err(ValidationError::PrecisionTooFine);
    }
    if amount > limit {
        return Err(ValidationError::AmountOverLimit);
    }
    Ok(())
}
