use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;

use crate::api::{ApiError, CreditApi, RemoteAccount};

struct RemoteUser {
    api_token: String,
    credits: f64,
}

/// In-process stand-in for the remote credit service.
///
/// Fault injection covers the two remote failure shapes that matter to the
/// ledger: a call that errors outright, and a write the service accepts but
/// never applies.
pub struct InMemoryCreditApi {
    users: Mutex<HashMap<String, RemoteUser>>,
    fail_next_call: AtomicBool,
    drop_next_write: AtomicBool,
}

impl InMemoryCreditApi {
    pub fn new() -> Self { Self { users: Mutex::new(HashMap::new()), fail_next_call: AtomicBool::new(false), drop_next_write: AtomicBool::new(false) } }

    /// Register a remote account with an initial balance.
    pub fn seed(&self, user_id: impl Into<String>, api_token: impl Into<String>, credits: f64) {
        self.users.lock().unwrap().insert(user_id.into(), RemoteUser { api_token: api_token.into(), credits });
    }

    /// The next call, read or write, fails with [`ApiError::Unavailable`].
    pub fn fail_next_call(&self) { self.fail_next_call.store(true, Ordering::SeqCst); }

    /// The next write is accepted but not applied.
    pub fn drop_next_write(&self) { self.drop_next_write.store(true, Ordering::SeqCst); }

    /// Direct read of a user's balance, bypassing the api surface and its
    /// fault injection.
    pub fn credits_of(&self, user_id: &str) -> Option<f64> {
        self.users.lock().unwrap().get(user_id).map(|user| user.credits)
    }

    fn take_fault(&self) -> Result<(), ApiError> {
        if self.fail_next_call.swap(false, Ordering::SeqCst) {
            Err(ApiError::Unavailable("injected fault".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryCreditApi {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl CreditApi for InMemoryCreditApi {
    async fn fetch_credits(&self, account: &RemoteAccount) -> Result<f64, ApiError> {
        self.take_fault()?;
        let users = self.users.lock().unwrap();
        let user = users.get(&account.user_id).ok_or_else(|| ApiError::AccountNotFound(account.user_id.clone()))?;
        if user.api_token != account.api_token {
            return Err(ApiError::Unauthorized(account.user_id.clone()));
        }
        Ok(user.credits)
    }

    async fn store_credits(&self, account: &RemoteAccount, credits: f64) -> Result<(), ApiError> {
        self.take_fault()?;
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&account.user_id).ok_or_else(|| ApiError::AccountNotFound(account.user_id.clone()))?;
        if user.api_token != account.api_token {
            return Err(ApiError::Unauthorized(account.user_id.clone()));
        }
        if self.drop_next_write.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        user.credits = credits;
        Ok(())
    }
}
