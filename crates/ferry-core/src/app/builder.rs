//! UploaderBuilder - オーケストレータの構築とワイヤリング
//!
//! # 起動時検証（Fail-fast 設計）
//! - `UploadConfig::validate()` を build() で実行する
//! - 必須ポートが 1 つでも欠けていれば、欠けている名前をすべて列挙して BuildError を返す
//! - Clock と IdGenerator は省略可能（SystemClock / UlidGenerator）

use std::sync::Arc;

use super::credential_guard::CredentialGuard;
use super::orchestrator::Uploader;
use super::retry::RetryController;
use crate::config::{ConfigError, UploadConfig};
use crate::ports::{
    Clock, CredentialStore, FileSource, HistoryRecorder, IdGenerator, ProgressSink, SystemClock, TokenRefresher,
    Transport, UlidGenerator,
};

/// # 使用例
/// ```ignore
/// let uploader = UploaderBuilder::new(UploadConfig::default())
///     .credential_store(Arc::new(InMemoryCredentialStore::new()))
///     .file_source(Arc::new(LocalFileSource::new("/var/tmp/ferry")))
///     .transport(Arc::new(YouTubeTransport::new()?))
///     .token_refresher(Arc::new(refresher))
///     .progress_sink(Arc::new(LogProgressSink))
///     .history(Arc::new(InMemoryHistory::new()))
///     .build()?;
/// ```
pub struct UploaderBuilder {
    config: UploadConfig,
    credentials: Option<Arc<dyn CredentialStore>>,
    files: Option<Arc<dyn FileSource>>,
    transport: Option<Arc<dyn Transport>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    sink: Option<Arc<dyn ProgressSink>>,
    history: Option<Arc<dyn HistoryRecorder>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はオーケストレータ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Missing ports: {0:?}. These collaborators must be provided before build().")]
    MissingPorts(Vec<&'static str>),
}

impl UploaderBuilder {
    pub fn new(config: UploadConfig) -> Self {
        Self {
            config,
            credentials: None,
            files: None,
            transport: None,
            refresher: None,
            sink: None,
            history: None,
            clock: None,
            ids: None,
        }
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    pub fn file_source(mut self, files: Arc<dyn FileSource>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryRecorder>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// # 検証
    /// - 設定値の検証（ConfigError）
    /// - 必須ポートの有無（MissingPorts）
    pub fn build(self) -> Result<Uploader, BuildError> {
        self.config.validate()?;

        let mut missing = Vec::new();
        if self.credentials.is_none() {
            missing.push("credential_store");
        }
        if self.files.is_none() {
            missing.push("file_source");
        }
        if self.transport.is_none() {
            missing.push("transport");
        }
        if self.refresher.is_none() {
            missing.push("token_refresher");
        }
        if self.sink.is_none() {
            missing.push("progress_sink");
        }
        if self.history.is_none() {
            missing.push("history");
        }

        let (Some(credentials), Some(files), Some(transport), Some(refresher), Some(sink), Some(history)) = (
            self.credentials,
            self.files,
            self.transport,
            self.refresher,
            self.sink,
            self.history,
        ) else {
            return Err(BuildError::MissingPorts(missing));
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let guard = CredentialGuard::new(refresher, Arc::clone(&clock), self.config.safety_margin());
        let retry = RetryController::new(self.config.retry_policy());

        Ok(Uploader {
            config: self.config,
            guard,
            credentials,
            files,
            transport,
            sink,
            history,
            clock,
            ids,
            retry,
        })
    }
}
