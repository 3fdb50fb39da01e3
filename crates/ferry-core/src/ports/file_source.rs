//! FileSource port - 一時ストレージ上の動画ファイル
//!
//! ストリームは 1 回のアップロード専用で、順番に読みます（共有しない）。

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek};

use crate::domain::FileError;

/// Readable + seekable byte stream.
pub trait ByteStream: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> ByteStream for T {}

#[async_trait]
pub trait FileSource: Send + Sync {
    /// Open `file_id` and report its total length in bytes.
    async fn open_stream(&self, file_id: &str) -> Result<(Box<dyn ByteStream>, u64), FileError>;
}
