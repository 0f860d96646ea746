mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use common::*;

use bursar::{CompensationFault, CreditError, Ledger, Outcome, RollbackError, TrackedVec, TransactionError};
use bursar_core::{
    id::TargetId,
    operation::{Compensation, Key, OperationDraft, RemoteCompensation},
};

/// An operation that is recorded but never confirmed counts as failed when
/// the scope closes, and everything that did succeed is unwound.
#[tokio::test]
async fn an_unconfirmed_operation_fails_the_close() -> Result<()> {
    let ledger = Ledger::new();
    let names: TrackedVec<String> = TrackedVec::new("names");

    let trx = ledger.begin().await;
    names.push(&ledger, "alice".to_string());
    let stuck = trx.record(OperationDraft {
        target: TargetId::new(),
        key: Key::Attr("credits".into()),
        old_value: None,
        new_value: Some(10i64.into()),
        compensation: Compensation::Local(Box::new(|| Ok(()))),
    });

    let err = trx.end().await.unwrap_err();
    match err {
        TransactionError::Incomplete { failed, .. } => assert_eq!(failed, vec![stuck.id]),
        other => panic!("expected Incomplete, got {other:?}"),
    }
    assert!(names.is_empty());
    assert_eq!(stuck.outcome(), Outcome::Failed);
    Ok(())
}

/// A write the remote service accepted but never applied is detected by the
/// read-back, and closing the scope anyway reports it and unwinds the rest.
#[tokio::test]
async fn a_dropped_remote_write_fails_the_close() -> Result<()> {
    let world = world().await?;
    let (ledger, credits) = (&world.ledger, world.transfers.credits());
    let names: TrackedVec<String> = TrackedVec::new("names");

    let trx = ledger.begin().await;
    names.push(ledger, "pending-member".to_string());

    world.api.drop_next_write();
    let err = credits.adjust(ledger, &world.remote, 10.0).await.unwrap_err();
    assert!(matches!(err, CreditError::PostCondition { .. }));

    let err = trx.end().await.unwrap_err();
    assert!(matches!(err, TransactionError::Incomplete { .. }));
    assert!(names.is_empty());
    assert_eq!(world.api.credits_of("gamer-1"), Some(100.0));
    Ok(())
}

/// A compensation that cannot be applied surfaces as its own fatal error
/// instead of being swallowed. The two sides stay out of step until someone
/// reconciles them by hand.
#[tokio::test]
async fn a_failing_compensation_is_reported_not_masked() -> Result<()> {
    let world = world().await?;
    let (ledger, credits) = (&world.ledger, world.transfers.credits());

    let trx = ledger.begin().await;
    credits.adjust(ledger, &world.remote, 10.0).await?;

    // the compensating call hits an unreachable service
    world.api.fail_next_call();
    let err = trx.abort().await.unwrap_err();
    assert!(matches!(err.fault, CompensationFault::Remote(_)));
    assert_eq!(world.api.credits_of("gamer-1"), Some(110.0));
    Ok(())
}

/// When the close has to unwind and one of the inverses conflicts, the
/// rollback failure wins over the plain incomplete-transaction error.
#[tokio::test]
async fn a_failing_rollback_during_close_turns_fatal() -> Result<()> {
    let ledger = Ledger::new();

    let trx = ledger.begin().await;
    trx.record_applied(OperationDraft {
        target: TargetId::new(),
        key: Key::Attr("funds".into()),
        old_value: Some(1i64.into()),
        new_value: Some(2i64.into()),
        compensation: Compensation::Local(Box::new(|| {
            Err(CompensationFault::Conflict { detail: "funds were spent concurrently".into() })
        })),
    });
    trx.record(OperationDraft {
        target: TargetId::new(),
        key: Key::Attr("credits".into()),
        old_value: None,
        new_value: None,
        compensation: Compensation::Local(Box::new(|| Ok(()))),
    });

    let err = trx.end().await.unwrap_err();
    assert!(matches!(
        err,
        TransactionError::Rollback(RollbackError { fault: CompensationFault::Conflict { .. }, .. })
    ));
    Ok(())
}

struct SlowReversal {
    reversals: Arc<AtomicUsize>,
}

#[async_trait]
impl RemoteCompensation for SlowReversal {
    async fn compensate(&self) -> Result<(), CompensationFault> {
        self.reversals.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }
}

/// A close can itself be cancelled while a compensation is in flight. The
/// scope lock stays held until the unwind resumes and finishes, and no
/// inverse is applied twice.
#[tokio::test]
async fn a_timed_out_close_still_unwinds_before_the_next_scope() -> Result<()> {
    let ledger = Ledger::new();
    let names: TrackedVec<String> = TrackedVec::new("names");
    let reversals = Arc::new(AtomicUsize::new(0));

    let trx = ledger.begin().await;
    names.push(&ledger, "alice".to_string());
    let slow = trx.record(OperationDraft {
        target: TargetId::new(),
        key: Key::Attr("credits".into()),
        old_value: Some(0i64.into()),
        new_value: Some(10i64.into()),
        compensation: Compensation::Remote(Box::new(SlowReversal { reversals: reversals.clone() })),
    });
    slow.mark_succeeded().unwrap();
    // left pending so the close has to take the rollback path
    trx.record(OperationDraft {
        target: TargetId::new(),
        key: Key::Attr("credits".into()),
        old_value: None,
        new_value: None,
        compensation: Compensation::Local(Box::new(|| Ok(()))),
    });

    let record = trx.record_ref().clone();
    assert!(tokio::time::timeout(Duration::from_millis(50), trx.end()).await.is_err());

    // begin() waits for the dropped close to finish unwinding
    let trx2 = ledger.begin().await;
    assert!(names.is_empty());
    assert!(record.is_closed());
    assert_eq!(reversals.load(Ordering::SeqCst), 1);
    trx2.end().await?;
    Ok(())
}
