//! InMemoryCredentialStore - 開発用・テスト用の資格情報ストア
//!
//! # 実装詳細
//! - HashMap<UserId, Credential> を RwLock で保護
//! - 利用者ごとの排他は `UserLocks` に任せる

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Credential, CredentialError, UserId};
use crate::ports::{CredentialLease, CredentialStore, UserLocks};

#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<UserId, Credential>>,
    locks: UserLocks,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a credential before the store is shared.
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials
            .get_mut()
            .insert(credential.subject_id.clone(), credential);
        self
    }

    /// Snapshot of every stored credential.
    pub async fn snapshot(&self) -> Vec<Credential> {
        let mut all: Vec<_> = self.credentials.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.subject_id.cmp(&b.subject_id));
        all
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<Credential>, CredentialError> {
        Ok(self.credentials.read().await.get(user_id).cloned())
    }

    async fn put(&self, user_id: &UserId, credential: Credential) -> Result<(), CredentialError> {
        if &credential.subject_id != user_id {
            return Err(CredentialError::Store(format!(
                "credential of {} stored under {}",
                credential.subject_id, user_id
            )));
        }
        self.credentials.write().await.insert(user_id.clone(), credential);
        Ok(())
    }

    async fn lock_user(&self, user_id: &UserId) -> CredentialLease {
        self.locks.acquire(user_id).await
    }
}
