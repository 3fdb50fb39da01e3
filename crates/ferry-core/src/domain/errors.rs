//! Errors - エラー型と分類
//!
//! 内部のエラーは 3 系統に分かれます。
//! - `CredentialError`: トークンの取得・更新
//! - `TransportError`: リモートとの通信
//! - `UploadError`: オーケストレータが扱う最終的な失敗
//!
//! 利用者に見えるのは `FailureReason` だけです（`UploadResult::Failure` に載る）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// The refresh token itself was rejected. Not retried.
    #[error("refresh token rejected by the provider")]
    Expired,

    #[error("no credential stored for user {0}")]
    Missing(UserId),

    /// Token endpoint unreachable or failing; retried like any network error.
    #[error("token endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("credential store failure: {0}")]
    Store(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("remote rejected the access token")]
    Unauthorized,

    #[error("remote rejected the request: {0}")]
    RemoteRejected(String),

    #[error("upload session lost: {0}")]
    SessionLost(String),

    /// Connection failure or 5xx outside of a chunk send.
    #[error("remote unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("invalid file id: {0}")]
    InvalidId(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("gave up after {attempts} attempts: {last_cause}")]
    RetriesExhausted { attempts: u32, last_cause: String },

    #[error("upload cancelled")]
    Cancelled,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl UploadError {
    pub fn reason(&self) -> FailureReason {
        match self {
            UploadError::TooLarge { .. } => FailureReason::TooLarge,
            UploadError::RetriesExhausted { .. } => FailureReason::RetriesExhausted,
            UploadError::Cancelled => FailureReason::Cancelled,
            UploadError::ProtocolViolation(_) => FailureReason::ProtocolViolation,
            UploadError::InvalidMetadata(_) => FailureReason::InvalidMetadata,
            UploadError::File(_) => FailureReason::FileUnavailable,
            UploadError::Credential(CredentialError::Expired) => FailureReason::CredentialExpired,
            UploadError::Credential(CredentialError::Missing(_)) => FailureReason::CredentialMissing,
            UploadError::Credential(_) => FailureReason::CredentialUnavailable,
            UploadError::Transport(TransportError::Unauthorized) => FailureReason::Unauthorized,
            UploadError::Transport(TransportError::RemoteRejected(_)) => FailureReason::RemoteRejected,
            UploadError::Transport(TransportError::SessionLost(_)) => FailureReason::SessionLost,
            UploadError::Transport(TransportError::Unavailable(_)) => FailureReason::RetriesExhausted,
        }
    }
}

/// User-visible failure classification.
///
/// We serialize as SCREAMING_SNAKE_CASE so history records stay stable
/// across renames of the internal error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    TooLarge,
    RetriesExhausted,
    Cancelled,
    ProtocolViolation,
    InvalidMetadata,
    FileUnavailable,
    CredentialExpired,
    CredentialMissing,
    CredentialUnavailable,
    Unauthorized,
    RemoteRejected,
    SessionLost,
}

impl FailureReason {
    /// Short message the chat layer can show as-is.
    pub fn describe(self) -> &'static str {
        match self {
            FailureReason::TooLarge => "File too large.",
            FailureReason::RetriesExhausted => "Network error. Please check your connection and try again.",
            FailureReason::Cancelled => "Upload cancelled.",
            FailureReason::ProtocolViolation => "The video service sent an unexpected response. Please try again.",
            FailureReason::InvalidMetadata => "Invalid title or description.",
            FailureReason::FileUnavailable => "File not found or corrupted.",
            FailureReason::CredentialExpired => "Authentication expired. Please re-authenticate.",
            FailureReason::CredentialMissing => "Authentication required. Please authenticate first.",
            FailureReason::CredentialUnavailable => "Authentication service unavailable. Please try again later.",
            FailureReason::Unauthorized => "Invalid authentication token. Please re-authenticate.",
            FailureReason::RemoteRejected => "Upload rejected. Check your channel permissions and upload quota.",
            FailureReason::SessionLost => "Upload session was lost. Please send the video again.",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}
