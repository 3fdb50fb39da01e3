//! Transport port - リモートの resumable upload プロトコル
//!
//! HTTP やヘッダの形式は実装側（`impls::youtube`）の詳細です。
//! ここでは「セッションを開く・チャンクを送る・受信済み位置を問い合わせる」の 3 操作だけを定義します。

use async_trait::async_trait;

use crate::domain::{ChunkOutcome, ChunkRange, Credential, TransportError, UploadSession, VideoMetadata};

/// # 設計原則
/// - 送信結果は `ChunkOutcome` の閉じた集合で返す（セッション期限切れも値）
/// - `Err` は認証失敗・拒否・通信不能のような「チャンクの結果ではない」失敗だけ
/// - 同じセッションに対して並行に呼ばれることはない
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a resumable session for `total_bytes` bytes.
    async fn open(
        &self,
        metadata: &VideoMetadata,
        total_bytes: u64,
        credential: &Credential,
    ) -> Result<UploadSession, TransportError>;

    /// Send `bytes` as the byte range `range` of the session.
    async fn send_chunk(
        &self,
        session: &UploadSession,
        range: ChunkRange,
        bytes: &[u8],
        credential: &Credential,
    ) -> Result<ChunkOutcome, TransportError>;

    /// Ask the remote how much of an existing session it holds.
    ///
    /// `Accepted(n)` means the session is alive with `[0, n)` received;
    /// `SessionExpired` means the remote no longer knows it.
    async fn resume(
        &self,
        session: &UploadSession,
        credential: &Credential,
    ) -> Result<ChunkOutcome, TransportError>;
}
