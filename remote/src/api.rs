use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity and credential for one account on the remote credit service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub user_id: String,
    pub api_token: String,
}

impl RemoteAccount {
    pub fn new(user_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), api_token: api_token.into() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("account {0} not found on the remote service")]
    AccountNotFound(String),
    #[error("remote service rejected credential for {0}")]
    Unauthorized(String),
    #[error("remote service unavailable: {0}")]
    Unavailable(String),
}

/// Raw transport to the remote credit service. Implementations move credits
/// around and nothing else; recording and verification live in
/// [`CreditService`](crate::service::CreditService).
#[async_trait]
pub trait CreditApi: Send + Sync {
    /// Current credit balance of the remote account.
    async fn fetch_credits(&self, account: &RemoteAccount) -> Result<f64, ApiError>;

    /// Overwrite the credit balance of the remote account.
    async fn store_credits(&self, account: &RemoteAccount, credits: f64) -> Result<(), ApiError>;
}
