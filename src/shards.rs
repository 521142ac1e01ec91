use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, RwLock};

use crate::account_actor::{AccountActor, AccountHandle};
use crate::config::CoreConfig;
use crate::errors::CoreError;
use crate::ids::AccountNumber;
use crate::models::{TransactionRecord, TransactionRequest};
use crate::storage::BankStore;

/// Routes each account to its dedicated worker task.
///
/// Workers are created lazily on first use and live in hash-partitioned
/// shards so that spinning one up only contends on a fraction of the
/// routing table.
pub struct ShardRouter {
    shards: Vec<Arc<RwLock<Shard>>>,
    num_shards: usize,
    mailbox_capacity: usize,
    max_balance: Decimal,
    store: Arc<dyn BankStore>,
}

struct Shard {
    workers: HashMap<AccountNumber, AccountHandle>,
}

impl ShardRouter {
    pub fn new(store: Arc<dyn BankStore>, config: &CoreConfig) -> Self {
        let num_shards = config.shards.max(1);
        let shards = (0..num_shards)
            .map(|_| {
                Arc::new(RwLock::new(Shard {
                    workers: HashMap::new(),
                }))
            })
            .collect();

        Self {
            shards,
            num_shards,
            mailbox_capacity: config.mailbox_capacity.max(1),
            max_balance: config.max_balance,
            store,
        }
    }

    fn shard_index(&self, number: &AccountNumber) -> usize {
        let mut hasher = DefaultHasher::new();
        number.hash(&mut hasher);
        (hasher.finish() as usize) % self.num_shards
    }

    /// Get or create the worker handle for an account
    async fn handle_for(&self, number: &AccountNumber) -> AccountHandle {
        let shard = &self.shards[self.shard_index(number)];

        // Fast path (read lock)
        {
            let shard_lock = shard.read().await;
            if let Some(handle) = shard_lock.workers.get(number) {
                return handle.clone();
            }
        }

        let mut shard_lock = shard.write().await;

        // Double-check (another task might have created it)
        if let Some(handle) = shard_lock.workers.get(number) {
            return handle.clone();
        }

        let (tx, rx) = mpsc::channel(self.mailbox_capacity);
        let handle = AccountHandle::new(tx);

        let actor = AccountActor::new(
            number.clone(),
            rx,
            self.store.clone(),
            self.max_balance,
        );

        tokio::spawn(async move {
            actor.run().await;
        });

        shard_lock.workers.insert(number.clone(), handle.clone());
        handle
    }

    /// Forward a balance-mutating request to the account's worker.
    pub async fn apply(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionRecord, CoreError> {
        let handle = self.handle_for(&request.account).await;
        handle.apply(request).await
    }
}
