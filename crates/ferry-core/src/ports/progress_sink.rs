//! ProgressSink port - 進捗表示（チャット側）
//!
//! fire-and-forget です。失敗してもアップロードは止めません。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ProgressEvent, UploadId};

#[derive(Debug, Error)]
#[error("progress sink failed: {0}")]
pub struct SinkError(pub String);

#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(&self, upload_id: UploadId, event: &ProgressEvent) -> Result<(), SinkError>;
}
