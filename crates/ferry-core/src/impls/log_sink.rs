//! LogProgressSink - 進捗を tracing に流すだけの sink（CLI 用）

use async_trait::async_trait;
use tracing::info;

use crate::domain::{ProgressEvent, UploadId};
use crate::ports::{ProgressSink, SinkError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgressSink;

#[async_trait]
impl ProgressSink for LogProgressSink {
    async fn on_progress(&self, upload_id: UploadId, event: &ProgressEvent) -> Result<(), SinkError> {
        info!(
            %upload_id,
            percent = event.percent_complete,
            bytes_sent = event.bytes_sent,
            "upload progress: {}%",
            event.percent_complete
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ulid::Ulid;

    #[tokio::test]
    async fn never_fails() {
        let sink = LogProgressSink;
        let event = ProgressEvent::new(50, 100, Utc::now());
        assert!(sink.on_progress(UploadId::from_ulid(Ulid::new()), &event).await.is_ok());
    }
}
