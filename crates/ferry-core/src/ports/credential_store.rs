//! CredentialStore port - 利用者ごとの OAuth 資格情報の保存先
//!
//! # 設計原則
//! - refresh → put は利用者単位で直列化する（`lock_user`）
//! - プロセス全体のロックは使わない（別ユーザーのアップロードは並列のまま）

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::{Credential, CredentialError, UserId};

/// Held while one upload refreshes and persists a user's credential.
/// Dropping it lets the next waiter for the same user in.
pub struct CredentialLease {
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, user_id: &UserId) -> Result<Option<Credential>, CredentialError>;

    async fn put(&self, user_id: &UserId, credential: Credential) -> Result<(), CredentialError>;

    /// Per-user exclusion for refresh-and-persist.
    async fn lock_user(&self, user_id: &UserId) -> CredentialLease;
}

/// One async mutex per user, created on first use.
///
/// Store implementations embed this to satisfy [`CredentialStore::lock_user`].
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: &UserId) -> CredentialLease {
        // std Mutex はここで解放してから await する（ロック跨ぎ await しない）
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(user_id.clone()).or_default())
        };
        CredentialLease {
            _guard: lock.lock_owned().await,
        }
    }
}
