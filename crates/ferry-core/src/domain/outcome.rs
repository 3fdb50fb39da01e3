//! Outcome model: what one chunk send produced, and what one upload produced.

use serde::{Deserialize, Serialize};

use super::errors::{FailureReason, UploadError};

pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// The remote object created by a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteResource {
    pub id: String,
    pub url: String,
}

impl RemoteResource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Resource with the public watch URL derived from the video id.
    pub fn video(id: impl Into<String>) -> Self {
        let id = id.into();
        let url = format!("{WATCH_URL_PREFIX}{id}");
        Self { id, url }
    }
}

/// Closed set of results of one chunk send (or one resume query).
///
/// The orchestrator branches on these variants; nothing here is an error
/// type, so "session expired" never travels as an exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Remote holds bytes `[0, n)`.
    Accepted(u64),
    Completed(RemoteResource),
    Retriable(String),
    SessionExpired,
    Fatal(String),
}

/// Terminal record of one upload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadResult {
    Success {
        remote_resource_id: String,
        remote_url: String,
        duration_ms: u64,
    },
    Failure {
        reason: FailureReason,
        detail: String,
        last_acknowledged_bytes: u64,
    },
}

impl UploadResult {
    pub fn success(resource: RemoteResource, duration_ms: u64) -> Self {
        UploadResult::Success {
            remote_resource_id: resource.id,
            remote_url: resource.url,
            duration_ms,
        }
    }

    pub fn failure(error: &UploadError, last_acknowledged_bytes: u64) -> Self {
        UploadResult::Failure {
            reason: error.reason(),
            detail: error.to_string(),
            last_acknowledged_bytes,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            UploadResult::Failure { reason, .. } => Some(*reason),
            UploadResult::Success { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_resource_builds_watch_url() {
        let r = RemoteResource::video("dQw4w9WgXcQ");
        assert_eq!(r.url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn result_is_tagged_by_status() {
        let ok = UploadResult::success(RemoteResource::video("abc"), 1200);
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["status"], "SUCCESS");
        assert_eq!(v["remote_resource_id"], "abc");

        let failed = UploadResult::failure(&UploadError::Cancelled, 4096);
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["status"], "FAILURE");
        assert_eq!(v["reason"], "CANCELLED");
        assert_eq!(v["last_acknowledged_bytes"], 4096);
        assert_eq!(failed.failure_reason(), Some(FailureReason::Cancelled));
    }
}
