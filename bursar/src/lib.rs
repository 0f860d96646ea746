//! # Bursar
//!
//! Bursar runs virtual banks whose account balances mirror credits held on a
//! remote gamification account. Moving value between the two worlds touches
//! local state and a third-party API in one step, so every transfer runs as a
//! recorded, compensable transaction.
//!
//! ## Key Pieces
//!
//! - **Ledger** (`bursar-core`): append-only history of reversible operations,
//!   grouped into transactions that roll back in reverse order on failure
//! - **Tracked containers**: cells, vecs and maps whose mutations record their
//!   own inverse
//! - **CreditService** (`bursar-remote`): the remote saga participant, with
//!   write verification and compensation by negated adjustment
//! - **BankService / TransferService**: the domain layer, with banks and
//!   accounts persisted through pluggable storage engines
//!
//! ## Example: a deposit saga
//!
//! ```rust
//! # use std::sync::Arc;
//! # use bursar::{BankService, CreditService, InMemoryCreditApi, Ledger, RemoteAccount, TransferService};
//! # use bursar::storage::MemoryStorageEngine;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::new();
//! let banks = BankService::new(Arc::new(MemoryStorageEngine::new()), ledger.clone()).await?;
//!
//! let api = Arc::new(InMemoryCreditApi::new());
//! api.seed("gamer-1", "token-1", 100.0);
//! let transfers = TransferService::new(ledger.clone(), banks.clone(), CreditService::new(api));
//!
//! let iron = banks.create_bank("iron bank", "tycho").await?;
//! let account = banks.open_account(&iron.id, "checking", "tycho", "gamer-1").await?;
//!
//! // credits the local balance, debits the remote account, records both
//! let balance = transfers.deposit(&account.id, &RemoteAccount::new("gamer-1", "token-1"), 40.0).await?;
//! assert_eq!(balance, 40.0);
//! assert_eq!(ledger.history_len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! A failure after the local write rolls the transaction back before the
//! error reaches the caller; only a failed compensation leaves the two sides
//! out of step, and that is reported as its own fatal error.

pub mod bank;
pub mod config;
pub mod model;
pub mod transfer;

pub use bursar_core as core;
pub use bursar_remote as remote;

// Re-export commonly used types
pub use bank::{BankError, BankService};
pub use config::{Config, ConfigError, StorageBackend};
pub use model::{Account, Bank, LoanAccount};
pub use transfer::{TransferError, TransferService};

pub use bursar_core::{
    error::{CompensationFault, MutationError, RollbackError, TransactionError},
    ledger::{Ledger, OperationQuery},
    operation::{Operation, Outcome},
    tracked::{TrackedCell, TrackedMap, TrackedVec},
    transaction::Transaction,
};
pub use bursar_remote::{ApiError, CreditApi, CreditError, CreditService, InMemoryCreditApi, RemoteAccount};

pub mod storage {
    pub use bursar_core::storage::{StorageCollection, StorageCollectionWrapper, StorageEngine};
    pub use bursar_storage_json::JsonStorageEngine;
    pub use bursar_storage_memory::MemoryStorageEngine;
}
