use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use bursar_core::{
    error::CompensationFault,
    id::TargetId,
    ledger::Ledger,
    operation::{Compensation, Key, OperationDraft, RemoteCompensation},
};

use crate::api::{ApiError, CreditApi, RemoteAccount};

/// Remote reads are verified to this tolerance after a write.
const CREDIT_EPSILON: f64 = 1e-3;

#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("insufficient credits: {available} available, {requested} requested")]
    InsufficientCredits { available: f64, requested: f64 },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("credit write did not stick: expected {expected}, remote reports {actual}")]
    PostCondition { expected: f64, actual: f64 },
}

/// Saga participant for the remote credit balance.
///
/// [`adjust`](Self::adjust) follows a fixed sequence: read the current
/// balance, validate the delta against it, write the new balance, record the
/// operation, then re-read to confirm the write stuck. Only a confirmed write
/// marks the operation succeeded; anything else marks it failed so the
/// enclosing transaction knows to unwind.
pub struct CreditService {
    api: Arc<dyn CreditApi>,
    /// Stable ledger target per remote account, so every adjustment of the
    /// same account lands under one target in the history.
    targets: Arc<DashMap<String, TargetId>>,
}

impl Clone for CreditService {
    fn clone(&self) -> Self { Self { api: self.api.clone(), targets: self.targets.clone() } }
}

impl CreditService {
    pub fn new(api: Arc<dyn CreditApi>) -> Self { Self { api, targets: Arc::new(DashMap::new()) } }

    /// The ledger target this remote account's adjustments are recorded under.
    pub fn target_for(&self, user_id: &str) -> TargetId { *self.targets.entry(user_id.to_string()).or_insert_with(TargetId::new) }

    /// Unverified read of the remote balance.
    pub async fn credits(&self, account: &RemoteAccount) -> Result<f64, ApiError> { self.api.fetch_credits(account).await }

    /// Apply `delta` to the remote balance and record the adjustment.
    ///
    /// A negative delta that would take the balance below zero is rejected
    /// before anything is written or recorded. Returns the verified balance.
    pub async fn adjust(&self, ledger: &Ledger, account: &RemoteAccount, delta: f64) -> Result<f64, CreditError> {
        let current = self.api.fetch_credits(account).await?;
        if delta < 0.0 && current + delta < 0.0 {
            return Err(CreditError::InsufficientCredits { available: current, requested: -delta });
        }

        let expected = current + delta;
        self.api.store_credits(account, expected).await?;

        // Recorded only once the write was accepted; the outcome stays
        // pending until the read-back confirms it.
        let operation = ledger.record(OperationDraft {
            target: self.target_for(&account.user_id),
            key: Key::Attr("credits".into()),
            old_value: Some(current.into()),
            new_value: Some(expected.into()),
            compensation: Compensation::Remote(Box::new(NegatedAdjustment {
                service: self.clone(),
                account: account.clone(),
                delta,
            })),
        });

        let actual = match self.api.fetch_credits(account).await {
            Ok(actual) => actual,
            Err(e) => {
                let _ = operation.mark_failed();
                return Err(e.into());
            }
        };
        if (actual - expected).abs() > CREDIT_EPSILON {
            let _ = operation.mark_failed();
            warn!("credit adjustment of {delta} for {} did not stick, remote reports {actual}", account.user_id);
            return Err(CreditError::PostCondition { expected, actual });
        }

        let _ = operation.mark_succeeded();
        debug!("adjusted credits for {} by {delta}, balance now {actual}", account.user_id);
        Ok(actual)
    }

    /// The same read/validate/write/verify sequence as [`adjust`](Self::adjust)
    /// without touching the ledger. Compensations come through here.
    pub(crate) async fn apply_unrecorded(&self, account: &RemoteAccount, delta: f64) -> Result<f64, CreditError> {
        let current = self.api.fetch_credits(account).await?;
        if delta < 0.0 && current + delta < 0.0 {
            return Err(CreditError::InsufficientCredits { available: current, requested: -delta });
        }

        let expected = current + delta;
        self.api.store_credits(account, expected).await?;

        let actual = self.api.fetch_credits(account).await?;
        if (actual - expected).abs() > CREDIT_EPSILON {
            return Err(CreditError::PostCondition { expected, actual });
        }
        Ok(actual)
    }
}

impl std::fmt::Debug for CreditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditService").field("targets", &self.targets.len()).finish()
    }
}

/// Compensation for a credit adjustment: the opposite delta, applied through
/// the same service without recording a second operation.
pub struct NegatedAdjustment {
    service: CreditService,
    account: RemoteAccount,
    delta: f64,
}

#[async_trait]
impl RemoteCompensation for NegatedAdjustment {
    async fn compensate(&self) -> Result<(), CompensationFault> {
        debug!("reversing credit adjustment of {} for {}", self.delta, self.account.user_id);
        match self.service.apply_unrecorded(&self.account, -self.delta).await {
            Ok(_) => Ok(()),
            Err(e) => Err(CompensationFault::Remote(Box::new(e))),
        }
    }
}
