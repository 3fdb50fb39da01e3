//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! オーケストレータが使う外部の協調者（資格情報ストア、ファイル、リモート API、
//! 進捗表示、履歴）をそれぞれ trait にして、実装の詳細を隠蔽します。
//!
//! 実装は `impls` にあります。

pub mod clock;
pub mod credential_store;
pub mod file_source;
pub mod history;
pub mod id_generator;
pub mod progress_sink;
pub mod token_refresher;
pub mod transport;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::credential_store::{CredentialLease, CredentialStore, UserLocks};
pub use self::file_source::{ByteStream, FileSource};
pub use self::history::{HistoryError, HistoryRecorder};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::progress_sink::{ProgressSink, SinkError};
pub use self::token_refresher::{RefreshError, TokenRefresher};
pub use self::transport::Transport;
