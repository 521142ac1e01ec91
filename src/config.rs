use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Tunables for the transaction core.
///
/// The two money bounds are independent: the per-transaction cap limits a
/// single movement, the balance cap limits what an account may hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// The single supported currency code, stamped onto accounts at
    /// creation.
    pub currency: String,
    /// Upper bound for one deposit or withdrawal amount, inclusive.
    pub max_transaction_amount: Decimal,
    /// Upper bound for an account balance, inclusive.
    pub max_balance: Decimal,
    /// Number of router shards for account workers.
    pub shards: usize,
    /// Mailbox depth per account worker.
    pub mailbox_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            currency: "EUR".to_owned(),
            max_transaction_amount: dec!(10000.00),
            max_balance: dec!(10000.00),
            shards: 16,
            mailbox_capacity: 256,
        }
    }
}
