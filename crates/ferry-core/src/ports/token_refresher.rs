//! TokenRefresher port - refresh token を使ったアクセストークン更新
//!
//! 認可コードの交換（初回の OAuth フロー）はこのポートの範囲外です。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Credential, TokenGrant};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The provider refused the refresh token (revoked, expired, wrong client).
    #[error("refresh token rejected: {0}")]
    Rejected(String),

    #[error("token endpoint unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &Credential) -> Result<TokenGrant, RefreshError>;
}
