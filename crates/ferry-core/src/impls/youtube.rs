//! YouTubeTransport - YouTube Data API v3 の resumable upload
//!
//! # プロトコル
//! 1. `POST {base}/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status`
//!    → `Location` ヘッダがセッションの URL
//! 2. `PUT {location}` に `Content-Range: bytes a-b/total` でチャンクを送る
//!    - `308` + `Range: bytes=0-N` → `[0, N+1)` まで受信済み
//!    - `200` / `201` → 完了（本文の JSON に動画 ID）
//! 3. 受信済み位置の問い合わせは空の `PUT` に `Content-Range: bytes */total`
//!
//! | status | 結果 |
//! |---|---|
//! | 401 | `TransportError::Unauthorized` |
//! | 404 / 410 | `SessionExpired` |
//! | 429 / 5xx | `Retriable` |
//! | その他の 4xx | `Fatal` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::{
    ChunkOutcome, ChunkRange, Credential, RemoteResource, SessionLocator, TransportError, UploadSession,
    VideoMetadata,
};
use crate::ports::Transport;

pub const DEFAULT_UPLOAD_BASE: &str = "https://www.googleapis.com";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY_CHARS: usize = 300;

pub struct YouTubeTransport {
    client: Client,
    upload_base: String,
}

#[derive(Debug, Deserialize)]
struct VideoResource {
    id: String,
}

impl YouTubeTransport {
    pub fn new() -> Result<Self, TransportError> {
        // 308 is the protocol's "resume incomplete", never a redirect to follow
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| TransportError::Unavailable(format!("http client: {err}")))?;
        Ok(Self::with_base_url(client, DEFAULT_UPLOAD_BASE))
    }

    /// `client` must not follow redirects.
    pub fn with_base_url(client: Client, upload_base: impl Into<String>) -> Self {
        Self {
            client,
            upload_base: upload_base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn query(
        &self,
        session: &UploadSession,
        content_range: String,
        body: Vec<u8>,
        credential: &Credential,
    ) -> Result<ChunkOutcome, TransportError> {
        let len = body.len();
        let sent = self
            .client
            .put(session.locator.as_str())
            .bearer_auth(&credential.access_token)
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_RANGE, content_range)
            .body(body)
            .send()
            .await;
        match sent {
            Ok(response) => interpret(response).await,
            // connection reset, DNS, TLS: the remote may still hold the session
            Err(err) => Ok(ChunkOutcome::Retriable(format!("network error: {}", err.without_url()))),
        }
    }
}

#[async_trait]
impl Transport for YouTubeTransport {
    async fn open(
        &self,
        metadata: &VideoMetadata,
        total_bytes: u64,
        credential: &Credential,
    ) -> Result<UploadSession, TransportError> {
        let url = format!("{}/upload/youtube/v3/videos", self.upload_base);
        let body = json!({
            "snippet": {
                "title": metadata.title,
                "description": metadata.description,
                "tags": metadata.tags,
                "categoryId": metadata.category_id,
            },
            "status": {
                "privacyStatus": metadata.privacy,
                "selfDeclaredMadeForKids": metadata.made_for_kids,
            },
        });

        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&credential.access_token)
            .header("X-Upload-Content-Type", metadata.mime_type.as_str())
            .header("X-Upload-Content-Length", total_bytes)
            .json(&body)
            .send()
            .await
            .map_err(|err| TransportError::Unavailable(format!("network error: {}", err.without_url())))?;

        let status = response.status();
        if status.is_success() {
            let locator = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| TransportError::RemoteRejected("session opened without a Location header".into()))?;
            debug!(total_bytes, "resumable session initiated");
            return Ok(UploadSession::new(SessionLocator::new(locator), total_bytes));
        }

        let detail = error_detail(response).await;
        Err(match status {
            StatusCode::UNAUTHORIZED => TransportError::Unauthorized,
            s if is_retriable(s) => TransportError::Unavailable(format!("{s}: {detail}")),
            s => TransportError::RemoteRejected(format!("{s}: {detail}")),
        })
    }

    async fn send_chunk(
        &self,
        session: &UploadSession,
        range: ChunkRange,
        bytes: &[u8],
        credential: &Credential,
    ) -> Result<ChunkOutcome, TransportError> {
        self.query(
            session,
            content_range(range, session.total_bytes),
            bytes.to_vec(),
            credential,
        )
        .await
    }

    async fn resume(&self, session: &UploadSession, credential: &Credential) -> Result<ChunkOutcome, TransportError> {
        self.query(
            session,
            format!("bytes */{}", session.total_bytes),
            Vec::new(),
            credential,
        )
        .await
    }
}

/// `Content-Range` for a chunk; an empty range only commits the total.
fn content_range(range: ChunkRange, total_bytes: u64) -> String {
    if range.is_empty() {
        format!("bytes */{total_bytes}")
    } else {
        format!("bytes {}-{}/{}", range.start, range.end - 1, total_bytes)
    }
}

async fn interpret(response: Response) -> Result<ChunkOutcome, TransportError> {
    let status = response.status();
    match status {
        StatusCode::OK | StatusCode::CREATED => {
            let video: VideoResource = response
                .json()
                .await
                .map_err(|err| {
                    TransportError::RemoteRejected(format!("completion without a video id: {}", err.without_url()))
                })?;
            Ok(ChunkOutcome::Completed(RemoteResource::video(video.id)))
        }
        StatusCode::PERMANENT_REDIRECT => {
            // no Range header: the remote holds nothing yet
            let Some(value) = response.headers().get(RANGE) else {
                return Ok(ChunkOutcome::Accepted(0));
            };
            let raw = String::from_utf8_lossy(value.as_bytes()).into_owned();
            match parse_range_header(&raw) {
                Some(acknowledged) => Ok(ChunkOutcome::Accepted(acknowledged)),
                None => Ok(ChunkOutcome::Fatal(format!("unparseable Range header {raw:?}"))),
            }
        }
        StatusCode::UNAUTHORIZED => Err(TransportError::Unauthorized),
        StatusCode::NOT_FOUND | StatusCode::GONE => Ok(ChunkOutcome::SessionExpired),
        s if is_retriable(s) => Ok(ChunkOutcome::Retriable(s.to_string())),
        s => {
            let detail = error_detail(response).await;
            Ok(ChunkOutcome::Fatal(format!("{s}: {detail}")))
        }
    }
}

fn is_retriable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// `Range: bytes=0-N` → `N + 1` bytes held by the remote.
pub fn parse_range_header(value: &str) -> Option<u64> {
    let (start, end) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
    if start.trim() != "0" {
        return None;
    }
    end.trim().parse::<u64>().ok()?.checked_add(1)
}

async fn error_detail(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    message.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
