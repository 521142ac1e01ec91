use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::errors::CoreError;
use crate::ids::{AccountNumber, TransactionId};
use crate::models::{TransactionKind, TransactionRecord, TransactionRequest};
use crate::storage::{BankStore, StoreError};

/// Bound on regenerate-and-retry when a candidate transaction id is
/// already taken. The suffix space is large; hitting this means the store
/// is misbehaving, not bad luck.
const TRANSACTION_ID_ATTEMPTS: usize = 8;

pub enum AccountMessage {
    Apply {
        request: TransactionRequest,
        reply: oneshot::Sender<Result<TransactionRecord, CoreError>>,
    },
}

/// Worker task owning the balance-mutating step for one account.
///
/// All deposits and withdrawals for the account funnel through this
/// task's mailbox, which serializes the read-check-write cycle without
/// any lock shared across accounts. The worker is a serialization point,
/// not a cache: it re-reads store state for every message.
pub struct AccountActor {
    number: AccountNumber,
    store: Arc<dyn BankStore>,
    max_balance: Decimal,
    receiver: mpsc::Receiver<AccountMessage>,
}

impl AccountActor {
    pub fn new(
        number: AccountNumber,
        receiver: mpsc::Receiver<AccountMessage>,
        store: Arc<dyn BankStore>,
        max_balance: Decimal,
    ) -> Self {
        Self {
            number,
            store,
            max_balance,
            receiver,
        }
    }

    /// Run until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                AccountMessage::Apply { request, reply } => {
                    let result = self.handle_apply(request).await;
                    // A dropped reply receiver means the caller abandoned
                    // the request; the commit above already ran to
                    // completion either way.
                    let _ = reply.send(result);
                }
            }
        }
        debug!(account = %self.number, "account worker stopped");
    }

    async fn handle_apply(
        &mut self,
        request: TransactionRequest,
    ) -> Result<TransactionRecord, CoreError> {
        let account = self
            .store
            .account(&self.number)
            .await?
            .ok_or(CoreError::NotFound)?;
        if account.owner != request.caller {
            return Err(CoreError::Forbidden);
        }

        let new_balance = match request.kind {
            TransactionKind::Deposit => {
                let candidate = account.balance + request.amount;
                if candidate > self.max_balance {
                    return Err(CoreError::BalanceLimitExceeded);
                }
                candidate
            }
            TransactionKind::Withdrawal => {
                if request.amount > account.balance {
                    return Err(CoreError::InsufficientFunds);
                }
                account.balance - request.amount
            }
        };

        for _ in 0..TRANSACTION_ID_ATTEMPTS {
            let record = TransactionRecord {
                id: TransactionId::random(),
                account: self.number.clone(),
                owner: request.caller.clone(),
                amount: request.amount,
                kind: request.kind,
                reference: request.reference.clone(),
                created_at: Utc::now(),
            };
            match self
                .store
                .commit_transaction(record.clone(), new_balance)
                .await
            {
                Ok(()) => {
                    debug!(
                        account = %record.account,
                        id = %record.id,
                        kind = %record.kind,
                        amount = %record.amount,
                        "transaction committed"
                    );
                    return Ok(record);
                }
                Err(StoreError::DuplicateTransaction) => continue,
                Err(err) => {
                    error!(
                        account = %self.number,
                        error = ?err,
                        "transaction commit failed"
                    );
                    return Err(err.into());
                }
            }
        }

        Err(CoreError::Persistence(anyhow::anyhow!(
            "no unique transaction id after {TRANSACTION_ID_ATTEMPTS} attempts"
        )))
    }
}

/// Cheap clonable sender half for an [`AccountActor`].
#[derive(Clone)]
pub struct AccountHandle {
    sender: mpsc::Sender<AccountMessage>,
}

impl AccountHandle {
    pub fn new(sender: mpsc::Sender<AccountMessage>) -> Self {
        Self { sender }
    }

    pub async fn apply(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionRecord, CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.sender
            .send(AccountMessage::Apply {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| CoreError::Persistence(anyhow::anyhow!("account worker unavailable")))?;

        reply_rx
            .await
            .map_err(|_| CoreError::Persistence(anyhow::anyhow!("account worker dropped reply")))?
    }
}
