use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use bursar_core::{TrackedCell, TrackedValue, TrackedVec, Value};

pub const DEFAULT_LOAN_APR: f64 = 0.03;

fn fresh_id() -> String { Ulid::new().to_string() }

/// A virtual bank. Cloning shares the tracked account collections, so every
/// handle observes and mutates the same aggregate.
#[derive(Clone)]
pub struct Bank {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub funds: i64,
    pub loan_apr: f64,
    pub accounts: TrackedVec<Account>,
    pub loan_accounts: TrackedVec<LoanAccount>,
}

impl Bank {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: fresh_id(),
            name: name.into(),
            owner: owner.into(),
            funds: 0,
            loan_apr: DEFAULT_LOAN_APR,
            accounts: TrackedVec::new("accounts"),
            loan_accounts: TrackedVec::new("loan_accounts"),
        }
    }

    pub fn dump(&self) -> BankDoc {
        BankDoc {
            id: self.id.clone(),
            name: self.name.clone(),
            owner: self.owner.clone(),
            funds: self.funds,
            loan_apr: self.loan_apr,
            accounts: self.accounts.snapshot().iter().map(Account::dump).collect(),
            loan_accounts: self.loan_accounts.snapshot().iter().map(LoanAccount::dump).collect(),
        }
    }

    pub fn load(doc: BankDoc) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            owner: doc.owner,
            funds: doc.funds,
            loan_apr: doc.loan_apr,
            accounts: TrackedVec::with_items("accounts", doc.accounts.into_iter().map(Account::load).collect()),
            loan_accounts: TrackedVec::with_items("loan_accounts", doc.loan_accounts.into_iter().map(LoanAccount::load).collect()),
        }
    }
}

impl PartialEq for Bank {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl std::fmt::Debug for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bank").field("id", &self.id).field("name", &self.name).field("accounts", &self.accounts.len()).finish()
    }
}

/// A deposit account whose balance mirrors credits held on the remote
/// service. Cloning shares the tracked balance cell.
#[derive(Clone)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub bank: String,
    pub holder: String,
    pub remote_user: String,
    pub balance: TrackedCell<f64>,
}

impl Account {
    pub fn new(name: impl Into<String>, bank: impl Into<String>, holder: impl Into<String>, remote_user: impl Into<String>) -> Self {
        Self {
            id: fresh_id(),
            name: name.into(),
            bank: bank.into(),
            holder: holder.into(),
            remote_user: remote_user.into(),
            balance: TrackedCell::with_value("balance", 0.0),
        }
    }

    pub fn balance(&self) -> f64 { self.balance.get().unwrap_or(0.0) }

    pub fn dump(&self) -> AccountDoc {
        AccountDoc {
            id: self.id.clone(),
            name: self.name.clone(),
            bank: self.bank.clone(),
            holder: self.holder.clone(),
            remote_user: self.remote_user.clone(),
            balance: self.balance(),
        }
    }

    pub fn load(doc: AccountDoc) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            bank: doc.bank,
            holder: doc.holder,
            remote_user: doc.remote_user,
            balance: TrackedCell::with_value("balance", doc.balance),
        }
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account").field("id", &self.id).field("name", &self.name).field("balance", &self.balance()).finish()
    }
}

impl TrackedValue for Account {
    fn to_value(&self) -> Value { Value::snapshot(&self.dump()) }
}

/// A loan account. `balance` is the part of the loan still available to
/// draw down; interest accrues on the spent remainder.
#[derive(Clone)]
pub struct LoanAccount {
    pub id: String,
    pub name: String,
    pub bank: String,
    pub holder: String,
    pub remote_user: String,
    pub principal: f64,
    pub mpr: f64,
    pub term_days: u32,
    pub balance: TrackedCell<f64>,
    pub opened_on: Option<NaiveDate>,
}

impl LoanAccount {
    pub fn new(
        name: impl Into<String>,
        bank: impl Into<String>,
        holder: impl Into<String>,
        remote_user: impl Into<String>,
        principal: f64,
        mpr: f64,
        term_days: u32,
    ) -> Self {
        Self {
            id: fresh_id(),
            name: name.into(),
            bank: bank.into(),
            holder: holder.into(),
            remote_user: remote_user.into(),
            principal,
            mpr,
            term_days,
            balance: TrackedCell::with_value("balance", principal),
            opened_on: Some(chrono::Utc::now().date_naive()),
        }
    }

    pub fn balance(&self) -> f64 { self.balance.get().unwrap_or(0.0) }

    /// Level principal repayment plus interest on the drawn-down part.
    pub fn payment_due(&self) -> f64 {
        let interest = (self.principal - self.balance()) * self.mpr;
        self.principal / f64::from(self.term_days) + interest
    }

    pub fn dump(&self) -> LoanAccountDoc {
        LoanAccountDoc {
            id: self.id.clone(),
            name: self.name.clone(),
            bank: self.bank.clone(),
            holder: self.holder.clone(),
            remote_user: self.remote_user.clone(),
            principal: self.principal,
            mpr: self.mpr,
            term_days: self.term_days,
            balance: self.balance(),
            opened_on: self.opened_on,
        }
    }

    pub fn load(doc: LoanAccountDoc) -> Self {
        Self {
            id: doc.id,
            name: doc.name,
            bank: doc.bank,
            holder: doc.holder,
            remote_user: doc.remote_user,
            principal: doc.principal,
            mpr: doc.mpr,
            term_days: doc.term_days,
            balance: TrackedCell::with_value("balance", doc.balance),
            opened_on: doc.opened_on,
        }
    }
}

impl PartialEq for LoanAccount {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl std::fmt::Debug for LoanAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoanAccount").field("id", &self.id).field("name", &self.name).field("balance", &self.balance()).finish()
    }
}

impl TrackedValue for LoanAccount {
    fn to_value(&self) -> Value { Value::snapshot(&self.dump()) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDoc {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub funds: i64,
    pub loan_apr: f64,
    pub accounts: Vec<AccountDoc>,
    pub loan_accounts: Vec<LoanAccountDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDoc {
    pub id: String,
    pub name: String,
    pub bank: String,
    pub holder: String,
    pub remote_user: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanAccountDoc {
    pub id: String,
    pub name: String,
    pub bank: String,
    pub holder: String,
    pub remote_user: String,
    pub principal: f64,
    pub mpr: f64,
    pub term_days: u32,
    pub balance: f64,
    pub opened_on: Option<NaiveDate>,
}
