mod common;

use anyhow::Result;

use bursar::{Ledger, Outcome, TrackedVec};

#[tokio::test]
async fn closing_a_transaction_keeps_every_applied_operation() -> Result<()> {
    let ledger = Ledger::new();
    let names: TrackedVec<String> = TrackedVec::new("names");

    let trx = ledger.begin().await;
    names.push(&ledger, "alpha".to_string());
    names.push(&ledger, "beta".to_string());
    trx.end().await?;

    assert_eq!(names.snapshot(), vec!["alpha".to_string(), "beta".to_string()]);

    let record = ledger.transactions().into_iter().next().unwrap();
    assert!(record.is_closed());
    assert_eq!(record.len(), 2);
    assert!(record.operations().iter().all(|op| op.outcome() == Outcome::Succeeded));
    Ok(())
}

/// Two overwrites of the same slot only land back on the original value if
/// the newer one is undone first.
#[tokio::test]
async fn rollback_unwinds_newest_first() -> Result<()> {
    let ledger = Ledger::new();
    let tiers = TrackedVec::with_items("tiers", vec!["bronze".to_string()]);

    let trx = ledger.begin().await;
    tiers.set(&ledger, 0, "silver".to_string())?;
    tiers.set(&ledger, 0, "gold".to_string())?;
    trx.abort().await?;

    assert_eq!(tiers.get(0), Some("bronze".to_string()));
    Ok(())
}

#[tokio::test]
async fn a_rolled_back_append_leaves_no_trace_in_the_collection() -> Result<()> {
    let ledger = Ledger::new();
    let names = TrackedVec::with_items("names", vec!["alice".to_string(), "bob".to_string()]);
    let before = names.snapshot();

    let trx = ledger.begin().await;
    names.push(&ledger, "carol".to_string());
    assert_eq!(names.len(), 3);
    trx.abort().await?;

    assert_eq!(names.snapshot(), before);
    // the attempt itself stays on the audit trail
    assert_eq!(ledger.history_len(), 1);
    Ok(())
}

#[tokio::test]
async fn an_abandoned_scope_rolls_back_before_the_next_one_opens() -> Result<()> {
    let ledger = Ledger::new();
    let names: TrackedVec<String> = TrackedVec::new("names");

    {
        let trx = ledger.begin().await;
        names.push(&ledger, "alice".to_string());
        drop(trx);
    }

    // begin() queues behind the abandoned scope's cleanup
    let trx = ledger.begin().await;
    assert!(names.is_empty());
    trx.end().await?;
    Ok(())
}

#[tokio::test]
async fn mutations_without_a_scope_commit_immediately() -> Result<()> {
    let ledger = Ledger::new();
    let names: TrackedVec<String> = TrackedVec::new("names");

    let op = names.push(&ledger, "alice".to_string());
    assert_eq!(op.transaction, None);
    assert_eq!(op.outcome(), Outcome::Succeeded);
    assert_eq!(ledger.history_len(), 1);
    assert!(ledger.transactions().is_empty());
    Ok(())
}
