mod common;

use anyhow::Result;
use common::*;

use bursar::{BankError, CreditError, Outcome, TransferError};

#[tokio::test]
async fn a_deposit_credits_the_account_and_debits_the_remote_user() -> Result<()> {
    let world = world().await?;

    let balance = world.transfers.deposit(&world.account.id, &world.remote, 40.0).await?;
    assert_eq!(balance, 40.0);
    assert_eq!(world.api.credits_of("gamer-1"), Some(60.0));

    // one closed transaction holding both halves of the transfer
    let record = world.ledger.transactions().into_iter().next_back().unwrap();
    assert!(record.is_closed());
    assert_eq!(record.len(), 2);
    assert!(record.operations().iter().all(|op| op.outcome() == Outcome::Succeeded));
    Ok(())
}

#[tokio::test]
async fn a_remote_failure_after_the_local_debit_restores_the_balance() -> Result<()> {
    let world = world().await?;
    world.transfers.deposit(&world.account.id, &world.remote, 50.0).await?;

    world.api.fail_next_call();
    let err = world.transfers.withdraw(&world.account.id, &world.remote, 20.0).await.unwrap_err();
    assert!(matches!(err, TransferError::Remote(CreditError::Api(_))));

    // the local debit was rolled back and the remote side never moved
    assert_eq!(world.account.balance(), 50.0);
    assert_eq!(world.api.credits_of("gamer-1"), Some(50.0));
    Ok(())
}

#[tokio::test]
async fn an_unapplied_remote_write_aborts_the_transfer() -> Result<()> {
    let world = world().await?;
    world.transfers.deposit(&world.account.id, &world.remote, 30.0).await?;

    world.api.drop_next_write();
    let err = world.transfers.withdraw(&world.account.id, &world.remote, 10.0).await.unwrap_err();
    assert!(matches!(err, TransferError::Remote(CreditError::PostCondition { .. })));

    assert_eq!(world.account.balance(), 30.0);
    assert_eq!(world.api.credits_of("gamer-1"), Some(70.0));
    Ok(())
}

#[tokio::test]
async fn an_oversized_withdrawal_is_rejected_before_anything_is_recorded() -> Result<()> {
    let world = world().await?;
    world.transfers.deposit(&world.account.id, &world.remote, 10.0).await?;
    let history = world.ledger.history_len();
    let scopes = world.ledger.transactions().len();

    let err = world.transfers.withdraw(&world.account.id, &world.remote, 80.0).await.unwrap_err();
    assert!(matches!(
        err,
        TransferError::Bank(BankError::InsufficientFunds { balance, requested }) if balance == 10.0 && requested == 80.0
    ));

    // no scope was opened, nothing was recorded
    assert_eq!(world.ledger.history_len(), history);
    assert_eq!(world.ledger.transactions().len(), scopes);
    Ok(())
}

#[tokio::test]
async fn an_oversized_deposit_is_rejected_by_the_validation_read() -> Result<()> {
    let world = world().await?;
    let history = world.ledger.history_len();

    let err = world.transfers.deposit(&world.account.id, &world.remote, 250.0).await.unwrap_err();
    assert!(matches!(err, TransferError::Remote(CreditError::InsufficientCredits { .. })));
    assert_eq!(world.ledger.history_len(), history);
    assert_eq!(world.account.balance(), 0.0);
    Ok(())
}

#[tokio::test]
async fn a_full_round_trip_returns_both_sides_to_their_start() -> Result<()> {
    let world = world().await?;

    world.transfers.deposit(&world.account.id, &world.remote, 25.0).await?;
    world.transfers.withdraw(&world.account.id, &world.remote, 25.0).await?;

    assert_eq!(world.account.balance(), 0.0);
    assert_eq!(world.api.credits_of("gamer-1"), Some(100.0));
    assert_eq!(world.ledger.transactions().len(), 2);
    Ok(())
}
