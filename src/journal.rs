use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, RwLock};

use crate::ids::{AccountNumber, OwnerId, TransactionId};
use crate::models::{Account, AccountPatch, TransactionRecord};
use crate::storage::{BankStore, StoreError, StoreState};

/// One committed state change, as written to the journal. Replaying the
/// full sequence rebuilds the store exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEvent {
    AccountOpened {
        account: Account,
    },
    MetadataUpdated {
        number: AccountNumber,
        patch: AccountPatch,
        at: DateTime<Utc>,
    },
    TransactionApplied {
        record: TransactionRecord,
        new_balance: Decimal,
    },
}

/// Append-only journal: one JSON event per line.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<File>,
}

impl Journal {
    /// Open for appending, creating the file if needed.
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Append one event. The commit that triggered the event must not be
    /// applied unless this returns `Ok`.
    pub async fn append(&self, event: &JournalEvent) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        // flush drains the buffer; sync_data makes the line durable.
        writer.flush().await?;
        writer.sync_data().await?;
        Ok(())
    }

    /// Read back every event in append order. Strict: a malformed line is
    /// an error, never skipped. Dropping a money movement on replay breaks
    /// conservation.
    pub async fn replay(&self) -> Result<Vec<JournalEvent>, StoreError> {
        let file = File::open(&self.path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let mut events = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }
}

/// Durable store: the in-memory state machine plus a write-ahead journal.
///
/// Every mutation validates against current state, appends its event, and
/// only then applies, all under the state write lock. A failed append
/// rejects the commit with no state change; a crash after the append is
/// repaired by replay on the next open.
pub struct JournaledStore {
    state: RwLock<StoreState>,
    journal: Journal,
}

impl JournaledStore {
    /// Open the journal at `path` and rebuild state by replaying it.
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let journal = Journal::open(path).await?;
        let mut state = StoreState::default();
        for (index, event) in journal.replay().await?.into_iter().enumerate() {
            Self::apply(&mut state, event).map_err(|err| {
                StoreError::Backend(anyhow::anyhow!(
                    "journal replay failed at entry {index}: {err}"
                ))
            })?;
        }
        Ok(Self {
            state: RwLock::new(state),
            journal,
        })
    }

    fn apply(state: &mut StoreState, event: JournalEvent) -> Result<(), StoreError> {
        match event {
            JournalEvent::AccountOpened { account } => state.insert_account(account),
            JournalEvent::MetadataUpdated { number, patch, at } => {
                state.update_metadata(&number, &patch, at).map(|_| ())
            }
            JournalEvent::TransactionApplied {
                record,
                new_balance,
            } => state.commit_transaction(record, new_balance),
        }
    }
}

#[async_trait]
impl BankStore for JournaledStore {
    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.contains_account(&account.number) {
            return Err(StoreError::DuplicateAccount);
        }
        self.journal
            .append(&JournalEvent::AccountOpened {
                account: account.clone(),
            })
            .await?;
        state.insert_account(account)
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
        let mut state = self.state.write().await;
        if !state.contains_account(number) {
            return Err(StoreError::MissingAccount);
        }
        if patch.is_empty() {
            return state.update_metadata(number, &patch, at);
        }
        self.journal
            .append(&JournalEvent::MetadataUpdated {
                number: number.clone(),
                patch: patch.clone(),
                at,
            })
            .await?;
        state.update_metadata(number, &patch, at)
    }

    async fn commit_transaction(
        &self,
        record: TransactionRecord,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.check_commit(&record)?;
        self.journal
            .append(&JournalEvent::TransactionApplied {
                record: record.clone(),
                new_balance,
            })
            .await?;
        state.commit_transaction(record, new_balance)
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

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::models::{AccountKind, TransactionKind};

    use super::*;

    fn sample_account() -> Account {
        let now = Utc::now();
        Account {
            number: AccountNumber::parse("01555001").unwrap(),
            owner: OwnerId::from("alice"),
            name: "Main".to_owned(),
            kind: AccountKind::Personal,
            balance: Decimal::ZERO,
            currency: "EUR".to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn events_round_trip_through_json() {
        let event = JournalEvent::TransactionApplied {
            record: TransactionRecord {
                id: TransactionId::parse("tan-journaltest1").unwrap(),
                account: AccountNumber::parse("01555001").unwrap(),
                owner: OwnerId::from("alice"),
                amount: dec!(12.34),
                kind: TransactionKind::Deposit,
                reference: Some("rent".to_owned()),
                created_at: Utc::now(),
            },
            new_balance: dec!(12.34),
        };
        let line = serde_json::to_string(&event).unwrap();
        assert!(line.contains("\"event\":\"transaction_applied\""));
        let back: JournalEvent = serde_json::from_str(&line).unwrap();
        match back {
            JournalEvent::TransactionApplied { record, new_balance } => {
                assert_eq!(record.amount, dec!(12.34));
                assert_eq!(new_balance, dec!(12.34));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn append_then_replay_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");

        let journal = Journal::open(path.clone()).await.unwrap();
        journal
            .append(&JournalEvent::AccountOpened {
                account: sample_account(),
            })
            .await
            .unwrap();
        journal
            .append(&JournalEvent::MetadataUpdated {
                number: AccountNumber::parse("01555001").unwrap(),
                patch: AccountPatch {
                    name: Some("Salary".to_owned()),
                    kind: None,
                },
                at: Utc::now(),
            })
            .await
            .unwrap();

        let events = journal.replay().await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], JournalEvent::AccountOpened { .. }));
        assert!(matches!(events[1], JournalEvent::MetadataUpdated { .. }));
    }

    #[tokio::test]
    async fn replay_rejects_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.log");
        tokio::fs::write(&path, "{\"event\":\"account_opened\"\n").await.unwrap();

        let journal = Journal::open(path).await.unwrap();
        let err = journal.replay().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
