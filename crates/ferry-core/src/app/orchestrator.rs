//! Uploader - アップロード 1 件のライフサイクルを駆動するオーケストレータ
//!
//! # 処理の流れ
//! 1. メタデータ検証 → ファイルを開く → サイズ上限チェック（ネットワーク呼び出し前）
//! 2. 資格情報を取得し、期限が近ければ更新（CredentialGuard）
//! 3. セッションを開く
//! 4. ChunkPlanner の範囲を順に送信（各送信は RetryController 経由）
//! 5. 受信済み位置が進んだら進捗イベントを publish
//! 6. セッション期限切れなら resume で位置を問い合わせて続きから送る
//! 7. 終了時に `UploadResult` を作り、HistoryRecorder に渡す
//!
//! # 失敗の扱い
//! - `upload` は失敗を返り値（`UploadResult::Failure`）でのみ表す（panic も Err も返さない）
//! - 401 は 1 回だけ強制 refresh して再試行する。2 回目の 401 は失敗
//! - 進捗 sink と履歴記録の失敗はログに出して無視する

use std::future::Future;
use std::io::SeekFrom;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::cancel::CancelSignal;
use super::credential_guard::CredentialGuard;
use super::planner;
use super::progress::ProgressDispatcher;
use super::retry::{Escalation, FailureClass, RetryController};
use super::session::{Progress, SessionDriver};
use crate::config::UploadConfig;
use crate::domain::{
    ChunkRange, Credential, CredentialError, FileError, ProgressEvent, RemoteResource, TransportError,
    UploadError, UploadId, UploadResult, UserId, VideoMetadata,
};
use crate::ports::{
    ByteStream, Clock, CredentialStore, FileSource, HistoryRecorder, IdGenerator, ProgressSink, Transport,
};

/// Resumable upload orchestrator.
///
/// # 使用例
/// ```ignore
/// let uploader = UploaderBuilder::new(UploadConfig::from_env()?)
///     .credential_store(store)
///     .file_source(files)
///     .transport(transport)
///     .token_refresher(refresher)
///     .progress_sink(sink)
///     .history(history)
///     .build()?;
/// let result = uploader.upload("clip.mp4", &UserId::new("42"), &metadata).await;
/// ```
pub struct Uploader {
    pub(super) config: UploadConfig,
    pub(super) guard: CredentialGuard,
    pub(super) credentials: Arc<dyn CredentialStore>,
    pub(super) files: Arc<dyn FileSource>,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) sink: Arc<dyn ProgressSink>,
    pub(super) history: Arc<dyn HistoryRecorder>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) ids: Arc<dyn IdGenerator>,
    pub(super) retry: RetryController,
}

/// Credential in use by one upload.
struct AuthState {
    user_id: UserId,
    credential: Credential,
}

#[derive(Debug, Clone, Copy)]
enum Renewal {
    IfStale,
    Force,
}

impl Uploader {
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Upload `file_id` on behalf of `user_id`. Never fails: every problem
    /// ends up in [`UploadResult::Failure`].
    pub async fn upload(&self, file_id: &str, user_id: &UserId, metadata: &VideoMetadata) -> UploadResult {
        self.upload_with_cancel(file_id, user_id, metadata, CancelSignal::never())
            .await
    }

    #[tracing::instrument(
        name = "upload",
        skip_all,
        fields(upload_id = tracing::field::Empty, user_id = %user_id, file_id = %file_id)
    )]
    pub async fn upload_with_cancel(
        &self,
        file_id: &str,
        user_id: &UserId,
        metadata: &VideoMetadata,
        cancel: CancelSignal,
    ) -> UploadResult {
        let upload_id = self.ids.generate_upload_id();
        tracing::Span::current().record("upload_id", tracing::field::display(upload_id));
        let started = Instant::now();

        let progress = ProgressDispatcher::spawn(
            upload_id,
            Arc::clone(&self.sink),
            self.config.progress_queue_capacity,
            self.config.progress_sink_timeout(),
        );

        let mut acknowledged = 0;
        let outcome = self
            .drive(file_id, user_id, metadata, &cancel, &progress, &mut acknowledged)
            .await;

        let result = match outcome {
            Ok(resource) => {
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                info!(resource_id = %resource.id, duration_ms, "upload completed");
                UploadResult::success(resource, duration_ms)
            }
            Err(err) => {
                error!(error = %err, reason = ?err.reason(), acknowledged, "upload failed");
                UploadResult::failure(&err, acknowledged)
            }
        };

        progress.finish().await;
        self.record_history(upload_id, &result).await;
        result
    }

    async fn drive(
        &self,
        file_id: &str,
        user_id: &UserId,
        metadata: &VideoMetadata,
        cancel: &CancelSignal,
        progress: &ProgressDispatcher,
        acknowledged: &mut u64,
    ) -> Result<RemoteResource, UploadError> {
        metadata.validate()?;

        let (mut stream, total) = self.files.open_stream(file_id).await?;
        if total > self.config.max_file_size_bytes {
            return Err(UploadError::TooLarge {
                size: total,
                limit: self.config.max_file_size_bytes,
            });
        }
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let stored = self
            .credentials
            .get(user_id)
            .await?
            .ok_or_else(|| CredentialError::Missing(user_id.clone()))?;
        let mut auth = AuthState {
            user_id: user_id.clone(),
            credential: stored,
        };

        let chunk_timeout = self.config.chunk_timeout();
        let transport = &*self.transport;
        let session = self
            .authorized(&mut auth, cancel, move |credential| async move {
                SessionDriver::open_attempt(transport, chunk_timeout, metadata, total, &credential).await
            })
            .await?;
        info!(total_bytes = total, "upload session opened");
        let mut driver = SessionDriver::new(Arc::clone(&self.transport), chunk_timeout, session);

        self.transfer(&mut driver, &mut stream, &mut auth, cancel, progress, acknowledged)
            .await
    }

    /// Upload over an opened session; any failure leaves the session `Failed`.
    async fn transfer(
        &self,
        driver: &mut SessionDriver,
        stream: &mut Box<dyn ByteStream>,
        auth: &mut AuthState,
        cancel: &CancelSignal,
        progress: &ProgressDispatcher,
        acknowledged: &mut u64,
    ) -> Result<RemoteResource, UploadError> {
        let transferred = self
            .send_all(driver, stream, auth, cancel, progress, acknowledged)
            .await;
        if transferred.is_err() {
            driver.mark_failed();
        }
        debug!(state = ?driver.session().state(), "session finished");
        transferred
    }

    async fn send_all(
        &self,
        driver: &mut SessionDriver,
        stream: &mut Box<dyn ByteStream>,
        auth: &mut AuthState,
        cancel: &CancelSignal,
        progress: &ProgressDispatcher,
        acknowledged: &mut u64,
    ) -> Result<RemoteResource, UploadError> {
        let total = driver.total_bytes();
        if total == 0 {
            return self.commit_empty(driver, auth, cancel).await;
        }

        let chunk_size = self.config.chunk_size_bytes;
        let mut reopens = 0;
        while let Some(range) = planner::next_range(driver.acknowledged_bytes(), total, chunk_size) {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            let bytes = read_range(stream, range).await?;
            debug!(%range, "sending chunk");

            let shared: &SessionDriver = driver;
            let sent = self
                .authorized(auth, cancel, |credential| shared.send(range, &bytes, credential))
                .await;
            let step = match sent {
                Ok(outcome) => driver.record(range, outcome)?,
                Err(Escalation::SessionExpired) => {
                    reopens += 1;
                    self.reopen(driver, auth, cancel, reopens).await?
                }
                Err(other) => return Err(other.into()),
            };
            *acknowledged = driver.acknowledged_bytes();

            if let Some(resource) = self.report(progress, driver, step) {
                return Ok(resource);
            }
        }

        // everything acknowledged without a completion answer: ask once more
        let shared: &SessionDriver = driver;
        let outcome = self
            .authorized(auth, cancel, |credential| shared.resume(credential))
            .await?;
        match driver.record_resume(outcome)? {
            Progress::Completed { resource, .. } => Ok(resource),
            Progress::Advanced(_) => Err(UploadError::ProtocolViolation(
                "remote holds every byte but never reported completion".into(),
            )),
        }
    }

    /// Zero-byte file: one empty commit that has to complete the session.
    async fn commit_empty(
        &self,
        driver: &mut SessionDriver,
        auth: &mut AuthState,
        cancel: &CancelSignal,
    ) -> Result<RemoteResource, UploadError> {
        let range = ChunkRange::new(0, 0);
        let shared: &SessionDriver = driver;
        let outcome = self
            .authorized(auth, cancel, |credential| shared.send(range, &[], credential))
            .await?;
        match driver.record(range, outcome)? {
            Progress::Completed { resource, .. } => Ok(resource),
            Progress::Advanced(_) => Err(UploadError::ProtocolViolation(
                "empty upload was not completed".into(),
            )),
        }
    }

    /// Re-query an expired session and continue from what the remote holds.
    async fn reopen(
        &self,
        driver: &mut SessionDriver,
        auth: &mut AuthState,
        cancel: &CancelSignal,
        reopens: u32,
    ) -> Result<Progress, UploadError> {
        if reopens > self.config.max_session_reopens {
            return Err(TransportError::SessionLost(format!(
                "session expired {reopens} times, giving up"
            ))
            .into());
        }
        warn!(
            reopens,
            acknowledged = driver.acknowledged_bytes(),
            "upload session expired, resuming"
        );
        driver.mark_reopening()?;
        let shared: &SessionDriver = driver;
        let outcome = self
            .authorized(auth, cancel, |credential| shared.resume(credential))
            .await?;
        driver.record_resume(outcome)
    }

    /// Publish progress for a recorded step; returns the resource once done.
    fn report(&self, progress: &ProgressDispatcher, driver: &SessionDriver, step: Progress) -> Option<RemoteResource> {
        let (advanced, resource) = match step {
            Progress::Advanced(advanced) => (advanced, None),
            Progress::Completed { resource, advanced } => (advanced, Some(resource)),
        };
        if advanced > 0 {
            progress.publish(ProgressEvent::new(
                driver.acknowledged_bytes(),
                driver.total_bytes(),
                self.clock.now(),
            ));
        }
        resource
    }

    /// Run `op` with a valid credential. A rejected token is refreshed once
    /// and retried; a second rejection is final.
    async fn authorized<T, F, Fut>(
        &self,
        auth: &mut AuthState,
        cancel: &CancelSignal,
        mut op: F,
    ) -> Result<T, Escalation>
    where
        F: FnMut(Credential) -> Fut,
        Fut: Future<Output = Result<T, FailureClass>>,
    {
        let mut forced = false;
        loop {
            self.renew(auth, cancel, Renewal::IfStale)
                .await
                .map_err(Escalation::Failed)?;
            let credential = auth.credential.clone();
            match self.retry.run(cancel, || op(credential.clone())).await {
                Err(Escalation::Unauthorized) if !forced => {
                    warn!(user_id = %auth.user_id, "access token rejected, refreshing once");
                    forced = true;
                    self.renew(auth, cancel, Renewal::Force)
                        .await
                        .map_err(Escalation::Failed)?;
                }
                Err(Escalation::Unauthorized) => {
                    return Err(Escalation::Failed(TransportError::Unauthorized.into()));
                }
                other => return other,
            }
        }
    }

    /// Refresh `auth` if needed and persist the result, one refresher per user.
    async fn renew(&self, auth: &mut AuthState, cancel: &CancelSignal, mode: Renewal) -> Result<(), UploadError> {
        if matches!(mode, Renewal::IfStale) && self.guard.is_fresh(&auth.credential) {
            return Ok(());
        }

        let _lease = self.credentials.lock_user(&auth.user_id).await;

        // a concurrent upload of the same user may have refreshed while we waited
        if let Some(stored) = self.credentials.get(&auth.user_id).await? {
            if stored.access_token != auth.credential.access_token && self.guard.is_fresh(&stored) {
                debug!(user_id = %auth.user_id, "using credential refreshed by another upload");
                auth.credential = stored;
                return Ok(());
            }
        }

        let current = &auth.credential;
        let guard = &self.guard;
        let guarded = self
            .retry
            .run(cancel, || async move {
                let renewed = match mode {
                    Renewal::IfStale => guard.ensure_valid(current).await,
                    Renewal::Force => guard.force_refresh(current).await,
                };
                renewed.map_err(FailureClass::from)
            })
            .await?;

        if guarded.refreshed {
            self.credentials
                .put(&auth.user_id, guarded.credential.clone())
                .await?;
            info!(user_id = %auth.user_id, expires_at = %guarded.credential.expires_at, "access token refreshed");
        }
        auth.credential = guarded.credential;
        Ok(())
    }

    async fn record_history(&self, upload_id: UploadId, result: &UploadResult) {
        if let Err(err) = self.history.record(upload_id, result).await {
            warn!(%upload_id, error = %err, "failed to record upload history");
        }
    }
}

async fn read_range(stream: &mut Box<dyn ByteStream>, range: ChunkRange) -> Result<Vec<u8>, FileError> {
    stream.seek(SeekFrom::Start(range.start)).await?;
    let mut bytes = vec![0u8; range.len() as usize];
    stream.read_exact(&mut bytes).await?;
    Ok(bytes)
}
