//! HistoryRecorder port - アップロード結果の永続記録

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{UploadId, UploadResult};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("history encode: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait HistoryRecorder: Send + Sync {
    async fn record(&self, upload_id: UploadId, result: &UploadResult) -> Result<(), HistoryError>;
}
