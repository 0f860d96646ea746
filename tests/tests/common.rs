use std::sync::Arc;

use tracing::Level;

use bursar::{
    storage::StorageEngine, Account, Bank, BankService, CreditService, Ledger, RemoteAccount, TransferService,
};
use bursar_remote::InMemoryCreditApi;
use bursar_storage_memory::MemoryStorageEngine;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() { tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init(); }

/// A full setup: one bank, one account holding nothing, one remote user
/// holding 100 credits.
#[allow(unused)]
pub struct World {
    pub ledger: Ledger,
    pub banks: BankService,
    pub api: Arc<InMemoryCreditApi>,
    pub transfers: TransferService,
    pub bank: Bank,
    pub account: Account,
    pub remote: RemoteAccount,
}

#[allow(unused)]
pub async fn world() -> anyhow::Result<World> {
    world_on(Arc::new(MemoryStorageEngine::new())).await
}

#[allow(unused)]
pub async fn world_on(engine: Arc<dyn StorageEngine>) -> anyhow::Result<World> {
    let ledger = Ledger::new();
    let banks = BankService::new(engine, ledger.clone()).await?;

    let api = Arc::new(InMemoryCreditApi::new());
    api.seed("gamer-1", "token-1", 100.0);
    let transfers = TransferService::new(ledger.clone(), banks.clone(), CreditService::new(api.clone()));

    let bank = banks.create_bank("iron bank", "tycho").await?;
    let account = banks.open_account(&bank.id, "checking", "tycho", "gamer-1").await?;
    let remote = RemoteAccount::new("gamer-1", "token-1");

    Ok(World { ledger, banks, api, transfers, bank, account, remote })
}
