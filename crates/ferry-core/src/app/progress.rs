//! ProgressDispatcher - 進捗イベントを上限付きキュー経由で ProgressSink に渡す
//!
//! # 設計原則
//! - `publish` はブロックしない（アップロードのループを止めない）
//! - キューが満杯なら最も古いイベントを捨てる（最新の進捗が残る）
//! - sink の失敗・タイムアウトはログに出して無視する
//! - イベントは 1 本のワーカーから順番に届く（順序は保たれる）
//! - `finish` が待つのは sink タイムアウト 1 回分まで（残りは捨てる）

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{ProgressEvent, UploadId};
use crate::ports::ProgressSink;

struct Shared {
    queue: Mutex<VecDeque<ProgressEvent>>,
    notify: Notify,
    closed: AtomicBool,
    capacity: usize,
    dropped: AtomicU64,
}

pub struct ProgressDispatcher {
    upload_id: UploadId,
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
    drain_deadline: Duration,
}

impl ProgressDispatcher {
    pub fn spawn(
        upload_id: UploadId,
        sink: Arc<dyn ProgressSink>,
        capacity: usize,
        sink_timeout: Duration,
    ) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        });
        let worker = tokio::spawn(deliver(upload_id, Arc::clone(&shared), sink, sink_timeout));
        Self {
            upload_id,
            shared,
            worker,
            drain_deadline: sink_timeout,
        }
    }

    /// Queue an event without waiting for the sink.
    pub fn publish(&self, event: ProgressEvent) {
        {
            let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
            if queue.len() >= self.shared.capacity {
                queue.pop_front();
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(event);
        }
        // Notify outside the lock
        self.shared.notify.notify_one();
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// Deliver what is still queued within one sink timeout, then stop the worker.
    pub async fn finish(mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
        match tokio::time::timeout(self.drain_deadline, &mut self.worker).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(upload_id = %self.upload_id, error = %err, "progress worker panicked");
            }
            Err(_) => {
                self.worker.abort();
                let undelivered = {
                    let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
                    let n = queue.len() as u64;
                    queue.clear();
                    n
                };
                self.shared.dropped.fetch_add(undelivered, Ordering::Relaxed);
                warn!(
                    upload_id = %self.upload_id,
                    undelivered,
                    deadline = ?self.drain_deadline,
                    "progress sink too slow, giving up on queued events"
                );
            }
        }
        let dropped = self.shared.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            debug!(upload_id = %self.upload_id, dropped, "progress events dropped by a slow sink");
        }
    }
}

async fn deliver(upload_id: UploadId, shared: Arc<Shared>, sink: Arc<dyn ProgressSink>, timeout: Duration) {
    loop {
        let next = shared.queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(event) => match tokio::time::timeout(timeout, sink.on_progress(upload_id, &event)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(%upload_id, percent = event.percent_complete, error = %err, "progress sink failed");
                }
                Err(_) => {
                    warn!(%upload_id, percent = event.percent_complete, ?timeout, "progress sink timed out");
                }
            },
            None if shared.closed.load(Ordering::Acquire) => break,
            None => shared.notify.notified().await,
        }
    }
}
