use crate::errors::CoreError;
use crate::ids::{AccountNumber, OwnerId};
use crate::models::Account;
use crate::storage::BankStore;

/// The authorization gate every account-touching operation passes first.
///
/// Absent account: `NotFound`. Present but not owned by `caller`:
/// `Forbidden`, a bare signal that leaks nothing about the account.
/// Otherwise the current account snapshot. Pure read, no side effects.
pub async fn authorize(
    store: &dyn BankStore,
    number: &AccountNumber,
    caller: &OwnerId,
) -> Result<Account, CoreError> {
    match store.account(number).await? {
        None => Err(CoreError::NotFound),
        Some(account) if account.owner != *caller => Err(CoreError::Forbidden),
        Some(account) => Ok(account),
    }
}
