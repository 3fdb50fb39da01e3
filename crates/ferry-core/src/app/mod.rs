//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアップロードのロジックを実装します。
//!
//! # 主要コンポーネント
//! - **UploaderBuilder**: オーケストレータの構築とワイヤリング
//! - **Uploader**: アップロード 1 件のライフサイクル（open → chunks → complete）
//! - **CredentialGuard**: 期限前のトークン更新
//! - **planner**: 次に送るバイト範囲
//! - **SessionDriver**: セッション状態と受信済み位置
//! - **RetryController**: 指数バックオフ付きのリトライ
//! - **ProgressDispatcher**: 進捗イベントの上限付きキュー
//! - **CancelHandle / CancelSignal**: 外部からの取り消し

pub mod builder;
pub mod cancel;
pub mod credential_guard;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod retry;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, UploaderBuilder};
pub use self::cancel::{CancelHandle, CancelSignal};
pub use self::credential_guard::{CredentialGuard, Guarded};
pub use self::orchestrator::Uploader;
pub use self::progress::ProgressDispatcher;
pub use self::retry::{Escalation, FailureClass, RetryController, RetryPolicy};
pub use self::session::SessionDriver;
