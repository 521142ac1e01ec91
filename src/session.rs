use std::collections::HashMap;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::csv_io::{OpKind, OperationRow};
use crate::engine::TransactionEngine;
use crate::errors::CoreError;
use crate::ids::{AccountNumber, OwnerId, TransactionId};
use crate::models::{Account, AccountKind, AccountPatch, NewAccount, TransactionKind, TransactionRequest};

/// Applies workload rows against the engine, resolving each file label
/// to the account number generated for it.
///
/// Core operations never see labels; the map lives here and is scoped to
/// one session (one replay run, or one server connection).
pub struct Session {
    engine: TransactionEngine,
    labels: HashMap<String, LabelEntry>,
    order: Vec<String>,
}

struct LabelEntry {
    number: AccountNumber,
    owner: OwnerId,
}

/// Result of one workload row, in driver terms.
pub enum RowOutcome {
    Opened {
        label: String,
        number: AccountNumber,
    },
    Applied {
        op: OpKind,
        label: String,
        id: TransactionId,
    },
    Updated {
        label: String,
    },
    Failed {
        op: OpKind,
        code: &'static str,
        detail: String,
    },
}

impl RowOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RowOutcome::Failed { .. })
    }
}

impl Session {
    pub fn new(engine: TransactionEngine) -> Self {
        Self {
            engine,
            labels: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Apply one row. Failures are returned as outcomes, never as
    /// errors, so a bad row cannot abort the run.
    pub async fn apply_row(&mut self, row: OperationRow) -> RowOutcome {
        match row.op {
            OpKind::Open => self.open(row).await,
            OpKind::Deposit | OpKind::Withdraw => self.movement(row).await,
            OpKind::Update => self.update(row).await,
        }
    }

    async fn open(&mut self, row: OperationRow) -> RowOutcome {
        if self.labels.contains_key(&row.label) {
            return RowOutcome::Failed {
                op: row.op,
                code: "duplicate-label",
                detail: format!("label {} already opened", row.label),
            };
        }
        let kind = match parse_kind(row.kind.as_deref()) {
            Ok(kind) => kind,
            Err(detail) => {
                return RowOutcome::Failed {
                    op: row.op,
                    code: "validation",
                    detail,
                }
            }
        };
        let request = NewAccount {
            owner: OwnerId::from(row.caller),
            name: row.name.unwrap_or_else(|| row.label.clone()),
            kind,
        };
        match self.engine.create_account(request).await {
            Ok(account) => {
                self.labels.insert(
                    row.label.clone(),
                    LabelEntry {
                        number: account.number.clone(),
                        owner: account.owner.clone(),
                    },
                );
                self.order.push(row.label.clone());
                debug!(label = %row.label, account = %account.number, "label bound");
                RowOutcome::Opened {
                    label: row.label,
                    number: account.number,
                }
            }
            Err(err) => failed(row.op, err),
        }
    }

    async fn movement(&mut self, row: OperationRow) -> RowOutcome {
        let number = match self.labels.get(&row.label) {
            Some(entry) => entry.number.clone(),
            None => {
                return RowOutcome::Failed {
                    op: row.op,
                    code: "unknown-label",
                    detail: format!("label {} was never opened", row.label),
                }
            }
        };
        let amount = match row.amount {
            Some(amount) => amount,
            None => {
                return RowOutcome::Failed {
                    op: row.op,
                    code: "validation",
                    detail: "missing amount column".to_string(),
                }
            }
        };
        let kind = match row.op {
            OpKind::Deposit => TransactionKind::Deposit,
            _ => TransactionKind::Withdrawal,
        };
        let request = TransactionRequest {
            account: number,
            caller: OwnerId::from(row.caller),
            amount,
            kind,
            reference: row.reference,
        };
        match self.engine.apply(request).await {
            Ok(record) => RowOutcome::Applied {
                op: row.op,
                label: row.label,
                id: record.id,
            },
            Err(err) => failed(row.op, err),
        }
    }

    async fn update(&mut self, row: OperationRow) -> RowOutcome {
        let number = match self.labels.get(&row.label) {
            Some(entry) => entry.number.clone(),
            None => {
                return RowOutcome::Failed {
                    op: row.op,
                    code: "unknown-label",
                    detail: format!("label {} was never opened", row.label),
                }
            }
        };
        let kind = match row.kind.as_deref() {
            None => None,
            Some(raw) => match AccountKind::from_str(raw) {
                Ok(kind) => Some(kind),
                Err(err) => {
                    return RowOutcome::Failed {
                        op: row.op,
                        code: "validation",
                        detail: err.to_string(),
                    }
                }
            },
        };
        let patch = AccountPatch {
            name: row.name,
            kind,
        };
        let caller = OwnerId::from(row.caller);
        match self.engine.update_metadata(&number, &caller, patch).await {
            Ok(_) => RowOutcome::Updated { label: row.label },
            Err(err) => failed(row.op, err),
        }
    }

    /// Final statement rows, one per opened label in workload order.
    /// Accounts are re-read so later operations are reflected.
    pub async fn statement(&self) -> Result<Vec<(String, Account)>, CoreError> {
        let mut rows = Vec::with_capacity(self.order.len());
        for label in &self.order {
            if let Some(entry) = self.labels.get(label) {
                let account = self.engine.account(&entry.number, &entry.owner).await?;
                rows.push((label.clone(), account));
            }
        }
        Ok(rows)
    }
}

fn parse_kind(raw: Option<&str>) -> Result<AccountKind, String> {
    match raw {
        None => Ok(AccountKind::Personal),
        Some(raw) => AccountKind::from_str(raw).map_err(|err| err.to_string()),
    }
}

fn failed(op: OpKind, err: CoreError) -> RowOutcome {
    // Business outcomes are routine; internal failures get their own line.
    if !err.is_business_outcome() {
        warn!(op = %op, error = %err, "operation failed internally");
    }
    RowOutcome::Failed {
        op,
        code: error_code(&err),
        detail: err.to_string(),
    }
}

/// Stable wire code for a core outcome.
pub fn error_code(err: &CoreError) -> &'static str {
    match err {
        CoreError::NotFound => "not-found",
        CoreError::Forbidden => "forbidden",
        CoreError::InsufficientFunds => "insufficient-funds",
        CoreError::BalanceLimitExceeded => "balance-limit",
        CoreError::Validation(_) => "validation",
        CoreError::Persistence(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use crate::config::CoreConfig;
    use crate::storage::MemoryStore;

    fn session() -> Session {
        let store = Arc::new(MemoryStore::new());
        Session::new(TransactionEngine::new(store, CoreConfig::default()))
    }

    fn row(op: OpKind, label: &str, caller: &str) -> OperationRow {
        OperationRow {
            op,
            label: label.to_string(),
            caller: caller.to_string(),
            name: None,
            kind: None,
            amount: None,
            reference: None,
        }
    }

    #[tokio::test]
    async fn open_and_deposit_show_up_in_the_statement() {
        let mut session = session();

        let mut open = row(OpKind::Open, "acc-a", "alice");
        open.name = Some("Groceries".to_string());
        open.kind = Some("personal".to_string());
        assert!(!session.apply_row(open).await.is_failure());

        let mut deposit = row(OpKind::Deposit, "acc-a", "alice");
        deposit.amount = Some(dec!(25.50));
        assert!(!session.apply_row(deposit).await.is_failure());

        let statement = session.statement().await.unwrap();
        assert_eq!(statement.len(), 1);
        assert_eq!(statement[0].0, "acc-a");
        assert_eq!(statement[0].1.balance, dec!(25.50));
    }

    #[tokio::test]
    async fn unknown_label_is_a_row_failure() {
        let mut session = session();
        let mut deposit = row(OpKind::Deposit, "ghost", "alice");
        deposit.amount = Some(dec!(5.00));

        match session.apply_row(deposit).await {
            RowOutcome::Failed { code, .. } => assert_eq!(code, "unknown-label"),
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn wrong_caller_is_rejected_by_the_core() {
        let mut session = session();
        assert!(!session.apply_row(row(OpKind::Open, "acc-a", "alice")).await.is_failure());

        let mut deposit = row(OpKind::Deposit, "acc-a", "mallory");
        deposit.amount = Some(dec!(5.00));

        match session.apply_row(deposit).await {
            RowOutcome::Failed { code, .. } => assert_eq!(code, "forbidden"),
            _ => panic!("expected failure"),
        }
    }
}
