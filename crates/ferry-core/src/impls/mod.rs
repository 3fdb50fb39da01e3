//! Impls - ports の実装
//!
//! # 開発用・テスト用
//! - **InMemoryCredentialStore**: 資格情報ストア
//! - **InMemoryHistory**: 履歴
//! - **LogProgressSink**: 進捗を tracing に出すだけ
//!
//! # 本番用
//! - **LocalFileSource**: 一時ストレージ上のファイル
//! - **JsonlHistoryRecorder**: 履歴ファイル（JSON Lines）
//! - **YouTubeTransport**: YouTube Data API v3 resumable upload
//! - **GoogleTokenRefresher**: Google OAuth 2.0 の token 更新

pub mod google_oauth;
pub mod history;
pub mod local_files;
pub mod log_sink;
pub mod memory_store;
pub mod youtube;

// 主要な型を再エクスポート
pub use self::google_oauth::GoogleTokenRefresher;
pub use self::history::{HistoryEntry, InMemoryHistory, JsonlHistoryRecorder};
pub use self::local_files::LocalFileSource;
pub use self::log_sink::LogProgressSink;
pub use self::memory_store::InMemoryCredentialStore;
pub use self::youtube::YouTubeTransport;
