use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use bursar_core::{
    error::{MutationError, StorageError},
    ledger::Ledger,
    storage::{StorageCollectionWrapper, StorageEngine},
};

use crate::model::{Account, Bank, LoanAccount};

const BANK_COLLECTION: &str = "banks";

#[derive(Debug, Error)]
pub enum BankError {
    #[error("bank {0} already exists, use a different name")]
    BankExists(String),

    #[error("bank {0} not found")]
    BankNotFound(String),

    #[error("account {name} already exists for {holder} in this bank")]
    AccountExists { name: String, holder: String },

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("{matches} {what}s matched, expected exactly one")]
    Ambiguous { what: &'static str, matches: usize },

    #[error("insufficient funds: balance is {balance}, {requested} requested")]
    InsufficientFunds { balance: f64, requested: f64 },

    #[error("loan term of {0} days is invalid, must be at least 1")]
    InvalidTerm(u32),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn exactly_one<T>(mut matches: Vec<T>, what: &'static str, missing: impl FnOnce() -> BankError) -> Result<T, BankError> {
    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(missing()),
        n => Err(BankError::Ambiguous { what, matches: n }),
    }
}

/// Registry of banks, loaded from storage at startup and written back after
/// every structural change. Balance changes are persisted by the transfer
/// service once its transaction closes.
#[derive(Clone)]
pub struct BankService {
    ledger: Ledger,
    banks: Arc<RwLock<Vec<Bank>>>,
    collection: StorageCollectionWrapper,
}

impl BankService {
    pub async fn new(engine: Arc<dyn StorageEngine>, ledger: Ledger) -> Result<Self, BankError> {
        let collection = StorageCollectionWrapper::new(engine.collection(BANK_COLLECTION).await?);
        let mut banks = Vec::new();
        for doc in collection.list().await? {
            banks.push(Bank::load(serde_json::from_value(doc).map_err(StorageError::from)?));
        }
        info!("loaded {} banks from storage", banks.len());
        Ok(Self { ledger, banks: Arc::new(RwLock::new(banks)), collection })
    }

    pub fn banks(&self) -> Vec<Bank> { self.banks.read().unwrap().clone() }

    pub fn bank_by_id(&self, id: &str) -> Result<Bank, BankError> {
        let matches = self.banks.read().unwrap().iter().filter(|bank| bank.id == id).cloned().collect();
        exactly_one(matches, "bank", || BankError::BankNotFound(id.to_string()))
    }

    pub fn bank_by_name(&self, name: &str) -> Result<Bank, BankError> {
        let matches = self.banks.read().unwrap().iter().filter(|bank| bank.name == name).cloned().collect();
        exactly_one(matches, "bank", || BankError::BankNotFound(name.to_string()))
    }

    pub async fn create_bank(&self, name: &str, owner: &str) -> Result<Bank, BankError> {
        let bank = {
            let mut banks = self.banks.write().unwrap();
            if banks.iter().any(|bank| bank.name == name) {
                return Err(BankError::BankExists(name.to_string()));
            }
            let bank = Bank::new(name, owner);
            banks.push(bank.clone());
            bank
        };

        self.persist(&bank).await?;
        info!("{owner} created bank {name}");
        Ok(bank)
    }

    pub async fn delete_bank(&self, name: &str) -> Result<(), BankError> {
        let bank = self.bank_by_name(name)?;
        self.banks.write().unwrap().retain(|existing| existing.id != bank.id);

        self.collection.remove(&bank.id).await?;
        warn!("bank {name} deleted");
        Ok(())
    }

    /// Open a deposit account. The account joins the bank's tracked
    /// collection, so the opening is recorded in the ledger history.
    pub async fn open_account(&self, bank_id: &str, name: &str, holder: &str, remote_user: &str) -> Result<Account, BankError> {
        let bank = self.bank_by_id(bank_id)?;
        self.ensure_account_name_free(&bank, name, holder)?;

        let account = Account::new(name, bank_id, holder, remote_user);
        bank.accounts.push(&self.ledger, account.clone());

        self.persist(&bank).await?;
        info!("{holder} opened account {name} in bank {}", bank.name);
        Ok(account)
    }

    pub async fn open_loan_account(
        &self,
        bank_id: &str,
        name: &str,
        holder: &str,
        remote_user: &str,
        principal: f64,
        mpr: f64,
        term_days: u32,
    ) -> Result<LoanAccount, BankError> {
        // the payment schedule divides by the term
        if term_days == 0 {
            return Err(BankError::InvalidTerm(term_days));
        }
        let bank = self.bank_by_id(bank_id)?;
        self.ensure_account_name_free(&bank, name, holder)?;

        let account = LoanAccount::new(name, bank_id, holder, remote_user, principal, mpr, term_days);
        bank.loan_accounts.push(&self.ledger, account.clone());

        self.persist(&bank).await?;
        info!("{holder} opened loan account {name} in bank {} for {principal}", bank.name);
        Ok(account)
    }

    pub async fn close_account(&self, bank_id: &str, holder: &str, name: &str) -> Result<(), BankError> {
        let bank = self.bank_by_id(bank_id)?;

        if let Some(account) = bank.accounts.snapshot().into_iter().find(|account| account.holder == holder && account.name == name) {
            bank.accounts.remove(&self.ledger, &account)?;
        } else if let Some(loan) = bank.loan_accounts.snapshot().into_iter().find(|loan| loan.holder == holder && loan.name == name) {
            bank.loan_accounts.remove(&self.ledger, &loan)?;
        } else {
            return Err(BankError::AccountNotFound(name.to_string()));
        }

        self.persist(&bank).await?;
        info!("{holder} closed account {name} in bank {}", bank.name);
        Ok(())
    }

    /// Find a deposit account anywhere in the registry, with its owning bank.
    pub fn account_by_id(&self, account_id: &str) -> Result<(Bank, Account), BankError> {
        let mut matches = Vec::new();
        for bank in self.banks() {
            for account in bank.accounts.snapshot() {
                if account.id == account_id {
                    matches.push((bank.clone(), account));
                }
            }
        }
        exactly_one(matches, "account", || BankError::AccountNotFound(account_id.to_string()))
    }

    /// Find a deposit account by bank, holder and name.
    pub fn account(&self, bank_id: &str, holder: &str, name: &str) -> Result<(Bank, Account), BankError> {
        let bank = self.bank_by_id(bank_id)?;
        let matches = bank
            .accounts
            .snapshot()
            .into_iter()
            .filter(|account| account.holder == holder && account.name == name)
            .map(|account| (bank.clone(), account))
            .collect();
        exactly_one(matches, "account", || BankError::AccountNotFound(name.to_string()))
    }

    /// Serialize the aggregate to its storage document.
    pub async fn persist(&self, bank: &Bank) -> Result<(), BankError> {
        self.collection.set(&bank.id, serde_json::to_value(bank.dump()).map_err(StorageError::from)?).await?;
        debug!("persisted bank {} ({})", bank.name, bank.id);
        Ok(())
    }

    fn ensure_account_name_free(&self, bank: &Bank, name: &str, holder: &str) -> Result<(), BankError> {
        let taken = bank.accounts.snapshot().iter().any(|account| account.holder == holder && account.name == name)
            || bank.loan_accounts.snapshot().iter().any(|loan| loan.holder == holder && loan.name == name);
        if taken {
            return Err(BankError::AccountExists { name: name.to_string(), holder: holder.to_string() });
        }
        Ok(())
    }
}

impl std::fmt::Debug for BankService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BankService").field("banks", &self.banks.read().unwrap().len()).finish()
    }
}
