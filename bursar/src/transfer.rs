use thiserror::Error;
use tracing::info;

use bursar_core::{
    error::{RollbackError, TransactionError},
    ledger::Ledger,
};
use bursar_remote::{CreditError, CreditService, RemoteAccount};

use crate::{
    bank::{BankError, BankService},
    model::Account,
};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer amount must be positive and finite, got {0}")]
    InvalidAmount(f64),

    #[error("account {account} belongs to remote user {expected}, not {provided}")]
    RemoteMismatch { account: String, expected: String, provided: String },

    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Remote(#[from] CreditError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// A compensating action failed while unwinding a transfer. The local
    /// and remote sides may disagree until someone reconciles them by hand.
    #[error(transparent)]
    Rollback(#[from] RollbackError),
}

/// Moves value between a local account balance and the remote credit
/// account it mirrors. Each direction is a single transaction: the local
/// balance is written first, the remote adjustment second, and a failure
/// after the local write rolls the whole scope back before the error
/// reaches the caller.
#[derive(Clone)]
pub struct TransferService {
    ledger: Ledger,
    bank: BankService,
    credits: CreditService,
}

impl TransferService {
    pub fn new(ledger: Ledger, bank: BankService, credits: CreditService) -> Self { Self { ledger, bank, credits } }

    pub fn bank(&self) -> &BankService { &self.bank }

    pub fn credits(&self) -> &CreditService { &self.credits }

    /// Move `amount` from the remote credit account into a local account.
    pub async fn deposit(&self, account_id: &str, remote: &RemoteAccount, amount: f64) -> Result<f64, TransferError> {
        check_amount(amount)?;
        let (bank, account) = self.bank.account_by_id(account_id)?;
        check_remote_binding(&account, remote)?;

        // Validation read. Rejecting an oversized deposit here leaves the
        // ledger history untouched.
        let available = self.credits.credits(remote).await.map_err(CreditError::from)?;
        if available < amount {
            return Err(CreditError::InsufficientCredits { available, requested: amount }.into());
        }

        let trx = self.ledger.begin().await;
        let balance = account.balance();
        account.balance.set(&trx, balance + amount);

        if let Err(e) = self.credits.adjust(&self.ledger, remote, -amount).await {
            trx.abort().await?;
            return Err(e.into());
        }

        trx.end().await?;
        self.bank.persist(&bank).await?;
        info!("{} deposited {amount} into account {}", account.holder, account.name);
        Ok(account.balance())
    }

    /// Move `amount` from a local account out to the remote credit account.
    pub async fn withdraw(&self, account_id: &str, remote: &RemoteAccount, amount: f64) -> Result<f64, TransferError> {
        check_amount(amount)?;
        let (bank, account) = self.bank.account_by_id(account_id)?;
        check_remote_binding(&account, remote)?;

        let balance = account.balance();
        if balance < amount {
            return Err(BankError::InsufficientFunds { balance, requested: amount }.into());
        }

        let trx = self.ledger.begin().await;
        // The balance may have moved while we waited for the scope lock.
        let balance = account.balance();
        if balance < amount {
            trx.abort().await?;
            return Err(BankError::InsufficientFunds { balance, requested: amount }.into());
        }
        account.balance.set(&trx, balance - amount);

        if let Err(e) = self.credits.adjust(&self.ledger, remote, amount).await {
            trx.abort().await?;
            return Err(e.into());
        }

        trx.end().await?;
        self.bank.persist(&bank).await?;
        info!("{} withdrew {amount} from account {}", account.holder, account.name);
        Ok(account.balance())
    }
}

/// Rejects NaN and the infinities as well as anything not strictly positive.
fn check_amount(amount: f64) -> Result<(), TransferError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(TransferError::InvalidAmount(amount));
    }
    Ok(())
}

fn check_remote_binding(account: &Account, remote: &RemoteAccount) -> Result<(), TransferError> {
    if account.remote_user != remote.user_id {
        return Err(TransferError::RemoteMismatch {
            account: account.id.clone(),
            expected: account.remote_user.clone(),
            provided: remote.user_id.clone(),
        });
    }
    Ok(())
}

impl std::fmt::Debug for TransferService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferService").finish_non_exhaustive()
    }
}
