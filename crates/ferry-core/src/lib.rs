//! ferry-core
//!
//! Resumable upload orchestrator: relays a local video file to a remote
//! video platform with a user's delegated OAuth credential.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, credential, metadata, chunk, session, outcome, errors）
//! - **ports**: 抽象化レイヤー（CredentialStore, TokenRefresher, FileSource, Transport, ProgressSink, HistoryRecorder, ...）
//! - **app**: アップロードのロジック（builder, orchestrator, credential_guard, planner, session, retry, progress, cancel）
//! - **impls**: 実装（in-memory 開発用、YouTube / Google OAuth、ローカルファイル、JSON Lines 履歴）
//! - **config**: 設定値（`FERRY_*` 環境変数）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{BuildError, CancelHandle, CancelSignal, Uploader, UploaderBuilder};
pub use config::{ConfigError, UploadConfig};
pub use domain::{Credential, FailureReason, UploadResult, UserId, VideoMetadata};
