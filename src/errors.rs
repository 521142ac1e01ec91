use thiserror::Error;

use crate::storage::StoreError;

/// Outcome taxonomy for every core operation.
///
/// Business outcomes (`NotFound`, `Forbidden`, `InsufficientFunds`,
/// `BalanceLimitExceeded`, `Validation`) are expected results the caller
/// must handle; `Persistence` is an opaque internal failure that is only
/// surfaced after a full rollback.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("account or transaction not found")]
    NotFound,
    #[error("caller does not own this account")]
    Forbidden,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("deposit would exceed the balance limit")]
    BalanceLimitExceeded,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("persistence failure")]
    Persistence(#[source] anyhow::Error),
}

impl CoreError {
    /// True for outcomes the presentation layer maps to client responses,
    /// false only for `Persistence`.
    pub fn is_business_outcome(&self) -> bool {
        !matches!(self, CoreError::Persistence(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::Persistence(err.into())
    }
}

/// Rejections raised before any store access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("amount precision is finer than two decimal places")]
    PrecisionTooFine,
    #[error("amount exceeds the per-transaction limit")]
    AmountOverLimit,
    #[error("malformed account number")]
    MalformedAccountNumber,
    #[error("malformed transaction id")]
    MalformedTransactionId,
    #[error("unknown account type")]
    UnknownAccountKind,
    #[error("unknown transaction kind")]
    UnknownTransactionKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_wraps_into_core_error() {
        let err: CoreError = ValidationError::NonPositiveAmount.into();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::NonPositiveAmount)
        ));
        assert!(err.is_business_outcome());
    }

    #[test]
    fn persistence_is_not_a_business_outcome() {
        let err = CoreError::Persistence(anyhow::anyhow!("store down"));
        assert!(!err.is_business_outcome());
    }
}
