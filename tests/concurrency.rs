use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use teller::{
    Account, AccountKind, AccountPatch, CoreConfig, CoreError, MemoryStore, NewAccount, OwnerId,
    TransactionEngine, TransactionKind, TransactionRequest,
};

fn engine() -> TransactionEngine {
    TransactionEngine::new(Arc::new(MemoryStore::new()), CoreConfig::default())
}

async fn open(engine: &TransactionEngine, owner: &str) -> Account {
    engine
        .create_account(NewAccount {
            owner: OwnerId::from(owner),
            name: "Main".to_string(),
            kind: AccountKind::Personal,
        })
        .await
        .unwrap()
}

fn movement(
    account: &Account,
    amount: Decimal,
    kind: TransactionKind,
) -> TransactionRequest {
    TransactionRequest {
        account: account.number.clone(),
        caller: account.owner.clone(),
        amount,
        kind,
        reference: None,
    }
}

// ============================================================================
// SAME-ACCOUNT SERIALIZATION TESTS
// ============================================================================

#[tokio::test]
async fn test_concurrent_withdrawals_cannot_double_spend() {
    let engine = engine();
    let account = open(&engine, "alice").await;
    engine
        .apply(movement(&account, dec!(100.00), TransactionKind::Deposit))
        .await
        .unwrap();

    // Two racing withdrawals of 80.00 against a 100.00 balance
    let mut handles = vec![];
    for _ in 0..2 {
        let engine = engine.clone();
        let account = account.clone();
        handles.push(tokio::spawn(async move {
            engine
                .apply(movement(&account, dec!(80.00), TransactionKind::Withdrawal))
                .await
        }));
    }

    let mut successes = 0;
    let mut rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(CoreError::InsufficientFunds) => rejections += 1,
            Err(other) => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(rejections, 1);

    let refreshed = engine.account(&account.number, &account.owner).await.unwrap();
    assert_eq!(refreshed.balance, dec!(20.00));

    // One deposit plus exactly one withdrawal made it into the ledger.
    let ledger = engine
        .transactions(&account.number, &account.owner)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 2);
}

#[tokio::test]
async fn test_conservation_under_a_mixed_storm() {
    let engine = engine();
    let account = open(&engine, "alice").await;
    engine
        .apply(movement(&account, dec!(500.00), TransactionKind::Deposit))
        .await
        .unwrap();

    let mut handles = vec![];
    for task in 0..20 {
        let engine = engine.clone();
        let account = account.clone();
        handles.push(tokio::spawn(async move {
            let mut outcomes = Vec::new();
            for step in 0..10 {
                let kind = if (task + step) % 2 == 0 {
                    TransactionKind::Deposit
                } else {
                    TransactionKind::Withdrawal
                };
                let result = engine
                    .apply(movement(&account, dec!(7.00), kind))
                    .await;
                outcomes.push((kind, result.is_ok()));
            }
            outcomes
        }));
    }

    let mut expected = dec!(500.00);
    for handle in handles {
        for (kind, succeeded) in handle.await.unwrap() {
            if succeeded {
                match kind {
                    TransactionKind::Deposit => expected += dec!(7.00),
                    TransactionKind::Withdrawal => expected -= dec!(7.00),
                }
            }
        }
    }

    let refreshed = engine.account(&account.number, &account.owner).await.unwrap();
    assert_eq!(refreshed.balance, expected);
    assert!(refreshed.balance >= Decimal::ZERO);

    // The ledger tells the same story as the balance.
    let ledger = engine
        .transactions(&account.number, &account.owner)
        .await
        .unwrap();
    let net: Decimal = ledger.iter().map(|record| record.signed_amount()).sum();
    assert_eq!(net, refreshed.balance);
}

#[tokio::test]
async fn test_abandoned_callers_never_leave_partial_state() {
    let engine = engine();
    let account = open(&engine, "alice").await;

    // Fire deposits from tasks that are aborted before they can read
    // their reply. A message already queued must still run to a clean
    // commit inside the worker; one that never reached the mailbox must
    // leave no trace. Nothing in between is acceptable.
    let mut handles = vec![];
    for _ in 0..50 {
        let engine = engine.clone();
        let account = account.clone();
        handles.push(tokio::spawn(async move {
            let _ = engine
                .apply(movement(&account, dec!(3.00), TransactionKind::Deposit))
                .await;
        }));
    }
    for handle in &handles {
        handle.abort();
    }
    for handle in handles {
        let _ = handle.await;
    }

    // The mailbox is FIFO, so once this deposit comes back every
    // abandoned message queued before it has been fully processed.
    engine
        .apply(movement(&account, dec!(1.00), TransactionKind::Deposit))
        .await
        .unwrap();

    let refreshed = engine.account(&account.number, &account.owner).await.unwrap();
    let ledger = engine
        .transactions(&account.number, &account.owner)
        .await
        .unwrap();

    // Balance and ledger agree, and every committed deposit is whole:
    // 1.00 from the awaited deposit plus one 3.00 per surviving record.
    let net: Decimal = ledger.iter().map(|record| record.signed_amount()).sum();
    assert_eq!(refreshed.balance, net);
    let landed = ledger
        .iter()
        .filter(|record| record.amount == dec!(3.00))
        .count();
    assert_eq!(ledger.len(), landed + 1);
    assert_eq!(net, dec!(1.00) + Decimal::from(landed as i64) * dec!(3.00));
}

// ============================================================================
// CROSS-ACCOUNT INDEPENDENCE TESTS
// ============================================================================

#[tokio::test]
async fn test_parallel_deposits_across_accounts_do_not_interfere() {
    let engine = engine();

    let mut accounts = Vec::new();
    for i in 0..10 {
        accounts.push(open(&engine, &format!("owner-{i}")).await);
    }

    let mut handles = vec![];
    for account in &accounts {
        let engine = engine.clone();
        let account = account.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..100 {
                engine
                    .apply(movement(&account, dec!(1.00), TransactionKind::Deposit))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for account in &accounts {
        let refreshed = engine.account(&account.number, &account.owner).await.unwrap();
        assert_eq!(refreshed.balance, dec!(100.00));
        let ledger = engine
            .transactions(&account.number, &account.owner)
            .await
            .unwrap();
        assert_eq!(ledger.len(), 100);
    }
}

// ============================================================================
// METADATA VS BALANCE INTERLEAVING TESTS
// ============================================================================

#[tokio::test]
async fn test_metadata_updates_never_disturb_racing_deposits() {
    let engine = engine();
    let account = open(&engine, "alice").await;

    let deposits = {
        let engine = engine.clone();
        let account = account.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                engine
                    .apply(movement(&account, dec!(2.00), TransactionKind::Deposit))
                    .await
                    .unwrap();
            }
        })
    };
    let renames = {
        let engine = engine.clone();
        let account = account.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                engine
                    .update_metadata(
                        &account.number,
                        &account.owner,
                        AccountPatch {
                            name: Some(format!("Name {i}")),
                            kind: None,
                        },
                    )
                    .await
                    .unwrap();
            }
        })
    };

    deposits.await.unwrap();
    renames.await.unwrap();

    let refreshed = engine.account(&account.number, &account.owner).await.unwrap();
    assert_eq!(refreshed.balance, dec!(100.00));
    assert_eq!(refreshed.name, "Name 49");
}
