mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use common::*;

use bursar::Ledger;

/// Waiting scopes open in strict begin order once the holder closes, and
/// none of them opens while the holder is still live.
#[tokio::test]
async fn scopes_are_granted_in_begin_order() -> Result<()> {
    let ledger = Ledger::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = ledger.begin().await;

    let mut handles = Vec::new();
    for index in 0..3 {
        let ledger = ledger.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            let trx = ledger.begin().await;
            order.lock().unwrap().push(index);
            trx.end().await
        }));
        // stagger the begins so the waiters queue deterministically
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(order.lock().unwrap().is_empty());
    first.end().await?;
    for handle in handles {
        handle.await??;
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    Ok(())
}

/// Transfers hitting the same account from several tasks serialize on the
/// transaction scope, so no interleaving can tear a balance update.
#[tokio::test]
async fn concurrent_transfers_serialize_cleanly() -> Result<()> {
    let world = world().await?;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let transfers = world.transfers.clone();
        let account_id = world.account.id.clone();
        let remote = world.remote.clone();
        handles.push(tokio::spawn(async move { transfers.deposit(&account_id, &remote, 10.0).await }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(world.account.balance(), 50.0);
    assert_eq!(world.api.credits_of("gamer-1"), Some(50.0));

    // five scopes, each closed around its own pair of operations
    let records = world.ledger.transactions();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|record| record.is_closed() && record.len() == 2));
    Ok(())
}
