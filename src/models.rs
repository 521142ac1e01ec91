use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::ids::{AccountNumber, OwnerId, TransactionId};

/// A balance-holding account owned by exactly one user.
///
/// `number` and `owner` are immutable after creation; `name` and `kind`
/// are mutable metadata; `balance` is mutated only by the transaction
/// engine's atomic commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub number: AccountNumber,
    pub owner: OwnerId,
    pub name: String,
    pub kind: AccountKind,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Personal,
    Business,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Personal => "personal",
            AccountKind::Business => "business",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "personal" => Ok(AccountKind::Personal),
            "business" => Ok(AccountKind::Business),
            _ => Err(ValidationError::UnknownAccountKind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            _ => Err(ValidationError::UnknownTransactionKind),
        }
    }
}

/// An immutable ledger entry: one deposit or withdrawal that was applied
/// to an account. Never updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account: AccountNumber,
    /// The identity that performed the transaction, kept for audit.
    pub owner: OwnerId,
    pub amount: Decimal,
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// The entry's contribution to the account balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Deposit => self.amount,
            TransactionKind::Withdrawal => -self.amount,
        }
    }
}

/// Inputs for opening an account. The balance always starts at zero and
/// the number is generated, so neither appears here.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner: OwnerId,
    pub name: String,
    pub kind: AccountKind,
}

/// Partial metadata update. Exactly the two mutable fields are
/// representable; balance and ownership cannot be smuggled through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AccountKind>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.kind.is_none()
    }
}

/// A requested money movement, as handed over by the presentation layer
/// together with the verified caller identity.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub account: AccountNumber,
    pub caller: OwnerId,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub reference: Option<String>,
}
