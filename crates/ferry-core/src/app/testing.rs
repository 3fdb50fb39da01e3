//! Scripted fakes for the app layer tests.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use tokio::time::Instant;

use super::builder::UploaderBuilder;
use super::cancel::CancelHandle;
use super::orchestrator::Uploader;
use crate::config::UploadConfig;
use crate::domain::{
    ChunkOutcome, ChunkRange, Credential, FileError, ProgressEvent, RemoteResource, SessionLocator, TokenGrant,
    TransportError, UploadId, UploadSession, UserId, VideoMetadata,
};
use crate::impls::{InMemoryCredentialStore, InMemoryHistory};
use crate::ports::{
    ByteStream, CredentialStore, FileSource, FixedClock, ProgressSink, RefreshError, SinkError, TokenRefresher,
    Transport,
};

pub const REMOTE_VIDEO_ID: &str = "video-123";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// Scripted reply of one transport call. Unscripted calls behave like `Auto`.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Behave like a healthy remote.
    Auto,
    Outcome(ChunkOutcome),
    Error(TransportError),
    /// Never answer within the given time.
    Stall(Duration),
}

#[derive(Default)]
struct TransportState {
    opens: VecDeque<Reply>,
    chunks: VecDeque<Reply>,
    resumes: VecDeque<Reply>,
    /// Bytes held by the remote, per session locator.
    remote: HashMap<String, u64>,
    sent: Vec<ChunkRange>,
    chunk_calls: Vec<Instant>,
    tokens: Vec<String>,
    open_count: usize,
    resume_count: usize,
    cancel_after: Option<(usize, CancelHandle)>,
}

/// Transport that follows a script and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    state: Mutex<TransportState>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_opens(&self, replies: impl IntoIterator<Item = Reply>) {
        self.state.lock().unwrap().opens.extend(replies);
    }

    pub fn script_chunks(&self, replies: impl IntoIterator<Item = Reply>) {
        self.state.lock().unwrap().chunks.extend(replies);
    }

    pub fn script_resumes(&self, replies: impl IntoIterator<Item = Reply>) {
        self.state.lock().unwrap().resumes.extend(replies);
    }

    /// Fire `handle` once `sends` chunk sends have returned.
    pub fn cancel_after(&self, sends: usize, handle: CancelHandle) {
        self.state.lock().unwrap().cancel_after = Some((sends, handle));
    }

    pub fn sent_ranges(&self) -> Vec<ChunkRange> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn chunk_call_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().chunk_calls.clone()
    }

    /// Access tokens presented, in call order (open, chunks, resumes).
    pub fn tokens_seen(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open_count
    }

    pub fn resume_count(&self) -> usize {
        self.state.lock().unwrap().resume_count
    }

    fn auto_chunk(&self, session: &UploadSession, range: ChunkRange) -> ChunkOutcome {
        let mut state = self.state.lock().unwrap();
        let held = state.remote.entry(session.locator.as_str().to_string()).or_default();
        *held = (*held).max(range.end);
        if *held >= session.total_bytes {
            ChunkOutcome::Completed(RemoteResource::video(REMOTE_VIDEO_ID))
        } else {
            ChunkOutcome::Accepted(*held)
        }
    }

    fn remember(&self, session: &UploadSession, outcome: &ChunkOutcome) {
        if let ChunkOutcome::Accepted(n) = outcome {
            let mut state = self.state.lock().unwrap();
            state.remote.insert(session.locator.as_str().to_string(), *n);
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(
        &self,
        _metadata: &VideoMetadata,
        total_bytes: u64,
        credential: &Credential,
    ) -> Result<UploadSession, TransportError> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.open_count += 1;
            state.tokens.push(credential.access_token.clone());
            state.opens.pop_front().unwrap_or(Reply::Auto)
        };
        match reply {
            Reply::Auto => {
                let n = self.open_count();
                Ok(UploadSession::new(
                    SessionLocator::new(format!("https://upload.test/session/{n}")),
                    total_bytes,
                ))
            }
            Reply::Error(err) => Err(err),
            Reply::Stall(d) => {
                tokio::time::sleep(d).await;
                Err(TransportError::Unavailable("stalled".into()))
            }
            Reply::Outcome(outcome) => panic!("open cannot reply with {outcome:?}"),
        }
    }

    async fn send_chunk(
        &self,
        session: &UploadSession,
        range: ChunkRange,
        bytes: &[u8],
        credential: &Credential,
    ) -> Result<ChunkOutcome, TransportError> {
        assert_eq!(bytes.len() as u64, range.len(), "payload does not match {range}");
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.sent.push(range);
            state.chunk_calls.push(Instant::now());
            state.tokens.push(credential.access_token.clone());
            state.chunks.pop_front().unwrap_or(Reply::Auto)
        };

        let result = match reply {
            Reply::Auto => Ok(self.auto_chunk(session, range)),
            Reply::Outcome(outcome) => {
                self.remember(session, &outcome);
                Ok(outcome)
            }
            Reply::Error(err) => Err(err),
            Reply::Stall(d) => {
                tokio::time::sleep(d).await;
                Ok(self.auto_chunk(session, range))
            }
        };

        let state = self.state.lock().unwrap();
        let sends = state.sent.len();
        if let Some((after, handle)) = &state.cancel_after {
            if *after == sends {
                handle.cancel();
            }
        }
        result
    }

    async fn resume(
        &self,
        session: &UploadSession,
        credential: &Credential,
    ) -> Result<ChunkOutcome, TransportError> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.resume_count += 1;
            state.tokens.push(credential.access_token.clone());
            state.resumes.pop_front().unwrap_or(Reply::Auto)
        };
        match reply {
            Reply::Auto => {
                let held = self
                    .state
                    .lock()
                    .unwrap()
                    .remote
                    .get(session.locator.as_str())
                    .copied()
                    .unwrap_or(0);
                if session.total_bytes > 0 && held >= session.total_bytes {
                    Ok(ChunkOutcome::Completed(RemoteResource::video(REMOTE_VIDEO_ID)))
                } else {
                    Ok(ChunkOutcome::Accepted(held))
                }
            }
            Reply::Outcome(outcome) => Ok(outcome),
            Reply::Error(err) => Err(err),
            Reply::Stall(d) => {
                tokio::time::sleep(d).await;
                Err(TransportError::Unavailable("stalled".into()))
            }
        }
    }
}

/// Refresher answering with a fixed grant (or a fixed rejection).
pub struct StaticRefresher {
    reply: Result<TokenGrant, RefreshError>,
    failures: Mutex<VecDeque<RefreshError>>,
    calls: AtomicUsize,
}

impl StaticRefresher {
    pub fn ok(access_token: &str, ttl: ChronoDuration, now: DateTime<Utc>) -> Self {
        Self {
            reply: Ok(TokenGrant {
                access_token: access_token.to_string(),
                expires_at: now + ttl,
                refresh_token: None,
            }),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejected() -> Self {
        Self {
            reply: Err(RefreshError::Rejected("invalid_grant".into())),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the first calls with `failures` before answering normally.
    pub fn failing_first(self, failures: impl IntoIterator<Item = RefreshError>) -> Self {
        self.failures.lock().unwrap().extend(failures);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresher for StaticRefresher {
    async fn refresh(&self, _credential: &Credential) -> Result<TokenGrant, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.reply.clone()
    }
}

#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for CollectingSink {
    async fn on_progress(&self, _upload_id: UploadId, event: &ProgressEvent) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressSink for FailingSink {
    async fn on_progress(&self, _upload_id: UploadId, _event: &ProgressEvent) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError("chat api down".into()))
    }
}

/// In-memory files keyed by id.
#[derive(Default)]
pub struct MemoryFileSource {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFileSource {
    pub fn insert(&mut self, file_id: &str, bytes: Vec<u8>) {
        self.files.insert(file_id.to_string(), bytes);
    }
}

#[async_trait]
impl FileSource for MemoryFileSource {
    async fn open_stream(&self, file_id: &str) -> Result<(Box<dyn ByteStream>, u64), FileError> {
        let bytes = self
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| FileError::NotFound(file_id.to_string()))?;
        let len = bytes.len() as u64;
        Ok((Box::new(Cursor::new(bytes)), len))
    }
}

/// Every port faked, with a valid credential for `user` stored.
pub struct Harness {
    pub user: UserId,
    pub clock: Arc<FixedClock>,
    pub store: Arc<InMemoryCredentialStore>,
    pub transport: Arc<ScriptedTransport>,
    pub refresher: Arc<StaticRefresher>,
    pub sink: Arc<CollectingSink>,
    pub history: Arc<InMemoryHistory>,
    files: MemoryFileSource,
}

impl Harness {
    pub fn new() -> Self {
        let user = UserId::new("user-42");
        let credential = Credential::new(user.clone(), "valid-access", "refresh-1", t0() + ChronoDuration::hours(1));
        Self {
            store: Arc::new(InMemoryCredentialStore::new().with_credential(credential)),
            user,
            clock: Arc::new(FixedClock::new(t0())),
            transport: Arc::new(ScriptedTransport::new()),
            refresher: Arc::new(StaticRefresher::ok("refreshed-access", ChronoDuration::hours(1), t0())),
            sink: Arc::new(CollectingSink::new()),
            history: Arc::new(InMemoryHistory::new()),
            files: MemoryFileSource::default(),
        }
    }

    /// Add a file of `len` bytes with a recognizable pattern.
    pub fn with_file(mut self, file_id: &str, len: u64) -> Self {
        let bytes = (0..len).map(|i| (i % 251) as u8).collect();
        self.files.insert(file_id, bytes);
        self
    }

    pub fn with_credential_expiring_in(mut self, ttl: ChronoDuration) -> Self {
        let credential = Credential::new(self.user.clone(), "valid-access", "refresh-1", t0() + ttl);
        self.store = Arc::new(InMemoryCredentialStore::new().with_credential(credential));
        self
    }

    pub fn without_credential(mut self) -> Self {
        self.store = Arc::new(InMemoryCredentialStore::new());
        self
    }

    pub fn with_refresher(mut self, refresher: StaticRefresher) -> Self {
        self.refresher = Arc::new(refresher);
        self
    }

    /// Builder with every port wired; tests may override single ports.
    pub fn builder(&self) -> UploaderBuilder {
        self.builder_with(UploadConfig::default())
    }

    pub fn builder_with(&self, config: UploadConfig) -> UploaderBuilder {
        let files = MemoryFileSource {
            files: self.files.files.clone(),
        };
        UploaderBuilder::new(config)
            .credential_store(self.store.clone())
            .file_source(Arc::new(files))
            .transport(self.transport.clone())
            .token_refresher(self.refresher.clone())
            .progress_sink(self.sink.clone())
            .history(self.history.clone())
            .clock(self.clock.clone())
    }

    pub fn uploader(&self) -> Uploader {
        self.uploader_with(UploadConfig::default())
    }

    pub fn uploader_with(&self, config: UploadConfig) -> Uploader {
        self.builder_with(config).build().unwrap()
    }

    pub async fn stored_credential(&self) -> Credential {
        self.store.get(&self.user).await.unwrap().unwrap()
    }
}
