use std::fmt;
use std::str::FromStr;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Prefix shared by every account number.
pub const ACCOUNT_NUMBER_PREFIX: &str = "01";
const ACCOUNT_NUMBER_DIGITS: usize = 6;

/// Prefix shared by every transaction id.
pub const TRANSACTION_ID_PREFIX: &str = "tan-";
const TRANSACTION_ID_SUFFIX_LEN: usize = 12;

/// External account identifier: `01` followed by six decimal digits.
///
/// The six-digit space is small enough that collisions are expected over
/// time; generation is only a candidate, uniqueness is enforced by the
/// store on insert.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountNumber(String);

impl AccountNumber {
    /// Draw a random candidate number.
    pub fn random() -> Self {
        let digits = rand::thread_rng().gen_range(0..1_000_000u32);
        Self(format!("{ACCOUNT_NUMBER_PREFIX}{digits:06}"))
    }

    /// Parse an externally supplied number, enforcing the lexical shape.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let expected_len = ACCOUNT_NUMBER_PREFIX.len() + ACCOUNT_NUMBER_DIGITS;
        if s.len() != expected_len
            || !s.starts_with(ACCOUNT_NUMBER_PREFIX)
            || !s.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ValidationError::MalformedAccountNumber);
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// External transaction identifier: `tan-` followed by a random
/// alphanumeric suffix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Draw a random candidate id. The store still checks it for
    /// uniqueness on commit; an existing id is never overwritten.
    pub fn random() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TRANSACTION_ID_SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!("{TRANSACTION_ID_PREFIX}{suffix}"))
    }

    /// Parse an externally supplied id, enforcing the lexical shape.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let suffix = s
            .strip_prefix(TRANSACTION_ID_PREFIX)
            .ok_or(ValidationError::MalformedTransactionId)?;
        if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ValidationError::MalformedTransactionId);
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Verified caller identity, supplied by the upstream authentication
/// collaborator. The core never inspects it beyond equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
