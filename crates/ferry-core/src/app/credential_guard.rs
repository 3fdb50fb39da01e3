//! CredentialGuard - 期限切れ前のアクセストークン更新
//!
//! # 設計原則
//! - 更新するのは「期限まで safety margin を切った」ときだけ
//! - 永続化はしない（`Guarded::refreshed` を見て呼び出し側が `put` する）
//! - refresh token の拒否は `Expired`（再認証が必要）、通信失敗は `Unavailable`（リトライ対象）

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::domain::{Credential, CredentialError};
use crate::ports::{Clock, RefreshError, TokenRefresher};

/// Credential that is valid for at least the safety margin.
#[derive(Debug, Clone)]
pub struct Guarded {
    pub credential: Credential,
    /// True when a refresh happened and the caller must persist the result.
    pub refreshed: bool,
}

pub struct CredentialGuard {
    refresher: Arc<dyn TokenRefresher>,
    clock: Arc<dyn Clock>,
    margin: Duration,
}

impl CredentialGuard {
    pub fn new(refresher: Arc<dyn TokenRefresher>, clock: Arc<dyn Clock>, margin: Duration) -> Self {
        Self {
            refresher,
            clock,
            margin,
        }
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    pub fn is_fresh(&self, credential: &Credential) -> bool {
        !credential.is_stale(self.clock.now(), self.margin)
    }

    /// Return `credential` untouched if fresh, otherwise refresh it.
    pub async fn ensure_valid(&self, credential: &Credential) -> Result<Guarded, CredentialError> {
        if self.is_fresh(credential) {
            return Ok(Guarded {
                credential: credential.clone(),
                refreshed: false,
            });
        }
        debug!(user_id = %credential.subject_id, expires_at = %credential.expires_at, "access token stale, refreshing");
        self.force_refresh(credential).await
    }

    /// Refresh regardless of the expiry, e.g. after the remote answered 401.
    pub async fn force_refresh(&self, credential: &Credential) -> Result<Guarded, CredentialError> {
        let grant = self.refresher.refresh(credential).await.map_err(|err| match err {
            RefreshError::Rejected(cause) => {
                warn!(user_id = %credential.subject_id, %cause, "refresh token rejected");
                CredentialError::Expired
            }
            RefreshError::Unavailable(cause) => CredentialError::Unavailable(cause),
        })?;

        let renewed = credential.with_grant(grant);
        if !self.is_fresh(&renewed) {
            warn!(
                user_id = %renewed.subject_id,
                expires_at = %renewed.expires_at,
                "refreshed access token already inside the safety margin"
            );
        }
        Ok(Guarded {
            credential: renewed,
            refreshed: true,
        })
    }
}
