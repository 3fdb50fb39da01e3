//! SessionDriver - 1 つのリモートセッションに対する送信と受信済み位置の管理
//!
//! # 責務
//! - Transport 呼び出しにチャンクタイムアウトを掛ける
//! - 結果を `FailureClass` に分類する（リトライ判断は RetryController）
//! - 受信済み位置（acknowledged_bytes）とセッション状態の唯一の書き手
//!
//! # 受信済み位置の扱い
//! - 送った範囲より先まで受信済みと言われた場合（over-acknowledgment）は受け入れて先に進む
//! - 後退した位置は protocol violation
//! - resume の応答が手元の位置より小さい場合はセッションを信用できないので SessionLost

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::retry::FailureClass;
use crate::domain::{
    ChunkOutcome, ChunkRange, Credential, RemoteResource, SessionState, TransportError, UploadError,
    UploadSession, VideoMetadata,
};
use crate::ports::Transport;

/// What a recorded outcome means for the upload loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Bytes newly acknowledged by the remote (may be 0).
    Advanced(u64),
    Completed { resource: RemoteResource, advanced: u64 },
}

pub struct SessionDriver {
    transport: Arc<dyn Transport>,
    chunk_timeout: Duration,
    session: UploadSession,
}

impl SessionDriver {
    /// One attempt at opening a session; classified for the retry controller.
    pub async fn open_attempt(
        transport: &dyn Transport,
        chunk_timeout: Duration,
        metadata: &VideoMetadata,
        total_bytes: u64,
        credential: &Credential,
    ) -> Result<UploadSession, FailureClass> {
        match tokio::time::timeout(chunk_timeout, transport.open(metadata, total_bytes, credential)).await {
            Err(_) => Err(FailureClass::Transient(format!(
                "session open timed out after {chunk_timeout:?}"
            ))),
            Ok(Err(err)) => Err(err.into()),
            Ok(Ok(session)) => {
                if session.total_bytes != total_bytes || session.acknowledged_bytes() != 0 {
                    return Err(FailureClass::Fatal(UploadError::ProtocolViolation(
                        "transport opened a session that does not match the file".into(),
                    )));
                }
                Ok(session)
            }
        }
    }

    pub fn new(transport: Arc<dyn Transport>, chunk_timeout: Duration, session: UploadSession) -> Self {
        Self {
            transport,
            chunk_timeout,
            session,
        }
    }

    pub fn session(&self) -> &UploadSession {
        &self.session
    }

    pub fn acknowledged_bytes(&self) -> u64 {
        self.session.acknowledged_bytes()
    }

    pub fn total_bytes(&self) -> u64 {
        self.session.total_bytes
    }

    /// Send one range. Only outcomes that move the upload forward come back
    /// as `Ok`; everything else is classified for the retry controller.
    pub async fn send(
        &self,
        range: ChunkRange,
        bytes: &[u8],
        credential: Credential,
    ) -> Result<ChunkOutcome, FailureClass> {
        let call = self.transport.send_chunk(&self.session, range, bytes, &credential);
        let outcome = match tokio::time::timeout(self.chunk_timeout, call).await {
            Err(_) => {
                return Err(FailureClass::Transient(format!(
                    "chunk {range} timed out after {:?}",
                    self.chunk_timeout
                )));
            }
            Ok(Err(err)) => return Err(err.into()),
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            ChunkOutcome::Accepted(n) if range.is_empty() => Err(FailureClass::Fatal(
                UploadError::ProtocolViolation(format!("empty commit acknowledged at {n} instead of completing")),
            )),
            ChunkOutcome::Accepted(n) if n < range.start => Err(FailureClass::Fatal(
                UploadError::ProtocolViolation(format!("chunk {range} acknowledged only up to {n}")),
            )),
            ChunkOutcome::Accepted(n) if n == range.start => {
                Err(FailureClass::Transient(format!("chunk {range} made no progress")))
            }
            ChunkOutcome::Retriable(cause) => Err(FailureClass::Transient(cause)),
            ChunkOutcome::SessionExpired => Err(FailureClass::SessionExpired),
            ChunkOutcome::Fatal(cause) => {
                Err(FailureClass::Fatal(TransportError::RemoteRejected(cause).into()))
            }
            ok @ (ChunkOutcome::Accepted(_) | ChunkOutcome::Completed(_)) => Ok(ok),
        }
    }

    /// Apply an accepted or completed outcome of `range` to the session.
    pub fn record(&mut self, range: ChunkRange, outcome: ChunkOutcome) -> Result<Progress, UploadError> {
        match outcome {
            ChunkOutcome::Accepted(n) => {
                if n > range.end && n <= self.session.total_bytes {
                    warn!(%range, acknowledged = n, "remote acknowledged past the chunk end");
                }
                self.session.transition(SessionState::Uploading)?;
                let advanced = self.session.acknowledge(n)?;
                debug!(%range, acknowledged = n, advanced, "chunk acknowledged");
                Ok(Progress::Advanced(advanced))
            }
            ChunkOutcome::Completed(resource) => self.complete(resource),
            other => Err(UploadError::ProtocolViolation(format!(
                "cannot record {other:?} for chunk {range}"
            ))),
        }
    }

    /// Ask the remote where the session stands.
    pub async fn resume(&self, credential: Credential) -> Result<ChunkOutcome, FailureClass> {
        let call = self.transport.resume(&self.session, &credential);
        let outcome = match tokio::time::timeout(self.chunk_timeout, call).await {
            Err(_) => {
                return Err(FailureClass::Transient(format!(
                    "resume query timed out after {:?}",
                    self.chunk_timeout
                )));
            }
            Ok(Err(err)) => return Err(err.into()),
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            ChunkOutcome::SessionExpired => Err(FailureClass::Fatal(
                TransportError::SessionLost("remote no longer knows the session".into()).into(),
            )),
            ChunkOutcome::Retriable(cause) => Err(FailureClass::Transient(cause)),
            ChunkOutcome::Fatal(cause) => {
                Err(FailureClass::Fatal(TransportError::RemoteRejected(cause).into()))
            }
            ok @ (ChunkOutcome::Accepted(_) | ChunkOutcome::Completed(_)) => Ok(ok),
        }
    }

    /// Apply a resume answer. The remote may never hold less than we
    /// already counted as acknowledged.
    pub fn record_resume(&mut self, outcome: ChunkOutcome) -> Result<Progress, UploadError> {
        match outcome {
            ChunkOutcome::Accepted(n) => {
                let local = self.session.acknowledged_bytes();
                if n < local {
                    return Err(TransportError::SessionLost(format!(
                        "remote holds {n} bytes, {local} were already acknowledged"
                    ))
                    .into());
                }
                self.session.transition(SessionState::Uploading)?;
                let advanced = self.session.acknowledge(n)?;
                debug!(acknowledged = n, advanced, "session resumed");
                Ok(Progress::Advanced(advanced))
            }
            ChunkOutcome::Completed(resource) => self.complete(resource),
            other => Err(UploadError::ProtocolViolation(format!(
                "cannot record resume answer {other:?}"
            ))),
        }
    }

    /// Session expired remotely; the next call re-queries it.
    pub fn mark_reopening(&mut self) -> Result<(), UploadError> {
        if self.session.state() == SessionState::Opening {
            return Ok(());
        }
        self.session.transition(SessionState::Opening)
    }

    /// Terminal failure; a completed session stays completed.
    pub fn mark_failed(&mut self) {
        if let Err(err) = self.session.transition(SessionState::Failed) {
            debug!(state = ?self.session.state(), error = %err, "session already finished");
        }
    }

    fn complete(&mut self, resource: RemoteResource) -> Result<Progress, UploadError> {
        let total = self.session.total_bytes;
        let advanced = self.session.acknowledge(total)?;
        self.session.transition(SessionState::Completed)?;
        debug!(resource_id = %resource.id, "session completed");
        Ok(Progress::Completed { resource, advanced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{Reply, ScriptedTransport};
    use crate::domain::{SessionLocator, UserId};
    use chrono::Utc;

    fn credential() -> Credential {
        Credential::new(UserId::new("u1"), "access", "refresh", Utc::now())
    }

    fn driver(transport: Arc<ScriptedTransport>, total: u64) -> SessionDriver {
        SessionDriver::new(
            transport,
            Duration::from_secs(30),
            UploadSession::new(SessionLocator::new("https://upload/s/1"), total),
        )
    }

    #[tokio::test]
    async fn accepted_chunk_advances_acknowledged_bytes() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut driver = driver(Arc::clone(&transport), 100);
        let range = ChunkRange::new(0, 40);

        let outcome = driver.send(range, &[0; 40], credential()).await.unwrap();
        assert_eq!(outcome, ChunkOutcome::Accepted(40));
        assert_eq!(driver.record(range, outcome).unwrap(), Progress::Advanced(40));
        assert_eq!(driver.acknowledged_bytes(), 40);
        assert_eq!(driver.session().state(), SessionState::Uploading);
    }

    #[tokio::test]
    async fn outcomes_are_classified() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_chunks([
            Reply::Outcome(ChunkOutcome::Retriable("503".into())),
            Reply::Outcome(ChunkOutcome::SessionExpired),
            Reply::Error(TransportError::Unauthorized),
            Reply::Outcome(ChunkOutcome::Fatal("quota".into())),
            Reply::Outcome(ChunkOutcome::Accepted(0)),
            Reply::Error(TransportError::Unavailable("reset".into())),
        ]);
        let driver = driver(Arc::clone(&transport), 100);
        let range = ChunkRange::new(0, 40);
        let bytes = [0u8; 40];

        assert!(matches!(driver.send(range, &bytes, credential()).await, Err(FailureClass::Transient(_))));
        assert!(matches!(driver.send(range, &bytes, credential()).await, Err(FailureClass::SessionExpired)));
        assert!(matches!(driver.send(range, &bytes, credential()).await, Err(FailureClass::Unauthorized)));
        assert!(matches!(
            driver.send(range, &bytes, credential()).await,
            Err(FailureClass::Fatal(UploadError::Transport(TransportError::RemoteRejected(_))))
        ));
        // no progress is retried, not trusted
        assert!(matches!(driver.send(range, &bytes, credential()).await, Err(FailureClass::Transient(_))));
        assert!(matches!(driver.send(range, &bytes, credential()).await, Err(FailureClass::Transient(_))));
    }

    #[tokio::test]
    async fn acknowledgment_behind_the_chunk_start_is_a_violation() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut driver = driver(Arc::clone(&transport), 100);
        driver.record(ChunkRange::new(0, 40), ChunkOutcome::Accepted(40)).unwrap();

        transport.script_chunks([Reply::Outcome(ChunkOutcome::Accepted(10))]);
        let err = driver.send(ChunkRange::new(40, 80), &[0; 40], credential()).await.unwrap_err();
        assert!(matches!(err, FailureClass::Fatal(UploadError::ProtocolViolation(_))));
    }

    #[test]
    fn over_acknowledgment_within_total_is_accepted() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut driver = driver(transport, 100);

        let progress = driver.record(ChunkRange::new(0, 40), ChunkOutcome::Accepted(60)).unwrap();
        assert_eq!(progress, Progress::Advanced(60));

        let err = driver.record(ChunkRange::new(60, 100), ChunkOutcome::Accepted(101)).unwrap_err();
        assert!(matches!(err, UploadError::ProtocolViolation(_)));
    }

    #[test]
    fn completion_acknowledges_everything() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut driver = driver(transport, 100);
        driver.record(ChunkRange::new(0, 40), ChunkOutcome::Accepted(40)).unwrap();

        let progress = driver
            .record(ChunkRange::new(40, 100), ChunkOutcome::Completed(RemoteResource::video("v1")))
            .unwrap();
        assert_eq!(
            progress,
            Progress::Completed {
                resource: RemoteResource::video("v1"),
                advanced: 60
            }
        );
        assert_eq!(driver.session().state(), SessionState::Completed);
    }

    #[test]
    fn failure_is_terminal_but_never_overrides_completion() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut failing = driver(Arc::clone(&transport), 100);
        failing.record(ChunkRange::new(0, 40), ChunkOutcome::Accepted(40)).unwrap();
        failing.mark_failed();
        assert_eq!(failing.session().state(), SessionState::Failed);
        failing.mark_failed();
        assert_eq!(failing.session().state(), SessionState::Failed);

        let mut done = driver(transport, 10);
        done.record(ChunkRange::new(0, 10), ChunkOutcome::Completed(RemoteResource::video("v1")))
            .unwrap();
        done.mark_failed();
        assert_eq!(done.session().state(), SessionState::Completed);
    }

    #[test]
    fn zero_byte_session_completes_from_opening() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut driver = driver(transport, 0);
        let progress = driver
            .record(ChunkRange::new(0, 0), ChunkOutcome::Completed(RemoteResource::video("v0")))
            .unwrap();
        assert!(matches!(progress, Progress::Completed { advanced: 0, .. }));
    }

    #[test]
    fn resume_behind_local_acknowledgment_is_session_lost() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut driver = driver(transport, 100);
        driver.record(ChunkRange::new(0, 50), ChunkOutcome::Accepted(50)).unwrap();
        driver.mark_reopening().unwrap();

        let err = driver.record_resume(ChunkOutcome::Accepted(30)).unwrap_err();
        assert_eq!(err.reason(), crate::domain::FailureReason::SessionLost);
    }

    #[tokio::test]
    async fn resume_of_unknown_session_is_fatal() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_resumes([Reply::Outcome(ChunkOutcome::SessionExpired)]);
        let driver = driver(Arc::clone(&transport), 100);

        let err = driver.resume(credential()).await.unwrap_err();
        assert!(matches!(
            err,
            FailureClass::Fatal(UploadError::Transport(TransportError::SessionLost(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_send_times_out_as_transient() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.script_chunks([Reply::Stall(Duration::from_secs(120))]);
        let driver = driver(Arc::clone(&transport), 100);

        let err = driver.send(ChunkRange::new(0, 40), &[0; 40], credential()).await.unwrap_err();
        assert!(matches!(err, FailureClass::Transient(cause) if cause.contains("timed out")));
    }
}
