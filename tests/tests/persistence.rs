mod common;

use std::sync::Arc;

use anyhow::Result;
use common::*;

use bursar::{BankService, Config, Ledger};
use bursar_storage_json::JsonStorageEngine;

#[tokio::test]
async fn balances_survive_an_engine_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let world = world_on(Arc::new(JsonStorageEngine::with_path(dir.path())?)).await?;
    world.transfers.deposit(&world.account.id, &world.remote, 45.0).await?;

    // a fresh service over the same directory sees the deposited balance
    let banks = BankService::new(Arc::new(JsonStorageEngine::with_path(dir.path())?), Ledger::new()).await?;
    let (_, account) = banks.account_by_id(&world.account.id)?;
    assert_eq!(account.balance(), 45.0);
    Ok(())
}

#[tokio::test]
async fn loan_accounts_and_their_terms_survive_a_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let world = world_on(Arc::new(JsonStorageEngine::with_path(dir.path())?)).await?;
    world.banks.open_loan_account(&world.bank.id, "mortgage", "tycho", "gamer-1", 300.0, 0.05, 30).await?;

    let banks = BankService::new(Arc::new(JsonStorageEngine::with_path(dir.path())?), Ledger::new()).await?;
    let bank = banks.bank_by_id(&world.bank.id)?;
    let loan = bank.loan_accounts.get(0).unwrap();
    assert_eq!(loan.principal, 300.0);
    assert_eq!(loan.payment_due(), 10.0);
    Ok(())
}

#[tokio::test]
async fn a_config_selected_engine_serves_the_bank_service() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config_path = dir.path().join("bursar.json");
    let contents = serde_json::json!({
        "storage": { "backend": "json", "path": dir.path().join("store") }
    });
    std::fs::write(&config_path, contents.to_string())?;

    let config = Config::from_file(&config_path)?;
    let banks = BankService::new(config.build_engine()?, Ledger::new()).await?;
    banks.create_bank("iron bank", "tycho").await?;

    let reloaded = BankService::new(config.build_engine()?, Ledger::new()).await?;
    assert!(reloaded.bank_by_name("iron bank").is_ok());
    Ok(())
}
