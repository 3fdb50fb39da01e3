//! Upload history recorders.
//!
//! - **JsonlHistoryRecorder**: 1 行 1 件の JSON でファイルに追記（永続記録）
//! - **InMemoryHistory**: テスト・開発用

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::domain::{UploadId, UploadResult};
use crate::ports::{Clock, HistoryError, HistoryRecorder};

/// One line of the history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub upload_id: UploadId,
    pub recorded_at: DateTime<Utc>,
    pub result: UploadResult,
}

pub struct JsonlHistoryRecorder {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    // appends from concurrent uploads must not interleave
    write_lock: AsyncMutex<()>,
}

impl JsonlHistoryRecorder {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            write_lock: AsyncMutex::new(()),
        }
    }

    /// Read every entry back (oldest first).
    pub async fn load(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(HistoryError::from))
            .collect()
    }
}

#[async_trait]
impl HistoryRecorder for JsonlHistoryRecorder {
    async fn record(&self, upload_id: UploadId, result: &UploadResult) -> Result<(), HistoryError> {
        let entry = HistoryEntry {
            upload_id,
            recorded_at: self.clock.now(),
            result: result.clone(),
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!(%upload_id, path = %self.path.display(), "upload recorded");
        Ok(())
    }
}

/// History kept in memory, in recording order.
#[derive(Default)]
pub struct InMemoryHistory {
    entries: Mutex<Vec<(UploadId, UploadResult)>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(UploadId, UploadResult)> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl HistoryRecorder for InMemoryHistory {
    async fn record(&self, upload_id: UploadId, result: &UploadResult) -> Result<(), HistoryError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((upload_id, result.clone()));
        Ok(())
    }
}
