//! ferry - ローカルの動画ファイルを YouTube に resumable upload する CLI
//!
//! # 使用例
//! ```text
//! ferry upload --file ./trip.mp4 --user alice --title "Trip" --privacy unlisted
//! ```
//!
//! 資格情報は JSON 配列のファイル（既定: `credentials.json`）から読み込み、
//! アップロード中に更新されたら書き戻します。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ferry_core::app::{CancelHandle, UploaderBuilder};
use ferry_core::config::UploadConfig;
use ferry_core::domain::{Credential, PrivacyStatus, UploadResult, UserId, VideoMetadata};
use ferry_core::impls::{
    GoogleTokenRefresher, InMemoryCredentialStore, JsonlHistoryRecorder, LocalFileSource, LogProgressSink,
    YouTubeTransport,
};
use ferry_core::ports::{Clock, CredentialStore, SystemClock};

#[derive(Debug, Parser)]
#[command(name = "ferry", version, about = "Resumable video uploads with delegated OAuth credentials")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload one local video file on behalf of a user.
    Upload(UploadArgs),
}

#[derive(Debug, clap::Args)]
struct UploadArgs {
    #[arg(long)]
    file: PathBuf,

    #[arg(long)]
    user: String,

    #[arg(long)]
    title: String,

    #[arg(long, default_value = "")]
    description: String,

    #[arg(long = "tag")]
    tags: Vec<String>,

    #[arg(long, default_value = "private")]
    privacy: PrivacyStatus,

    #[arg(long, default_value = "credentials.json")]
    credentials: PathBuf,

    #[arg(long, default_value = "upload-history.jsonl")]
    history: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Upload(args) => upload(args).await,
    }
}

async fn upload(args: UploadArgs) -> Result<()> {
    let config = UploadConfig::from_env().context("invalid FERRY_* configuration")?;
    let client_id = std::env::var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID is not set")?;
    let client_secret = std::env::var("GOOGLE_CLIENT_SECRET").context("GOOGLE_CLIENT_SECRET is not set")?;

    let (root, file_id) = split_file(&args.file)?;
    let user_id = UserId::new(args.user.as_str());

    let mut credentials = load_credentials(&args.credentials)?;
    let store = credentials
        .iter()
        .cloned()
        .fold(InMemoryCredentialStore::new(), InMemoryCredentialStore::with_credential);
    let store = Arc::new(store);
    let before = store.get(&user_id).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let refresher = GoogleTokenRefresher::new(client_id, client_secret, Arc::clone(&clock))?;
    let uploader = UploaderBuilder::new(config)
        .credential_store(store.clone())
        .file_source(Arc::new(LocalFileSource::new(root)))
        .transport(Arc::new(YouTubeTransport::new()?))
        .token_refresher(Arc::new(refresher))
        .progress_sink(Arc::new(LogProgressSink))
        .history(Arc::new(JsonlHistoryRecorder::new(&args.history, Arc::clone(&clock))))
        .clock(clock)
        .build()?;

    let metadata = args
        .tags
        .iter()
        .fold(VideoMetadata::new(args.title.as_str()), |m, tag| m.with_tag(tag.as_str()))
        .with_description(args.description.as_str())
        .with_privacy(args.privacy);

    let (cancel, signal) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling upload");
            cancel.cancel();
        }
    });

    let result = uploader.upload_with_cancel(&file_id, &user_id, &metadata, signal).await;

    let after = store.get(&user_id).await?;
    if let Some(renewed) = after.filter(|c| before.as_ref() != Some(c)) {
        credentials.retain(|c| c.subject_id != renewed.subject_id);
        credentials.push(renewed);
        save_credentials(&args.credentials, &credentials)?;
        info!(path = %args.credentials.display(), "stored renewed credential");
    }

    match result {
        UploadResult::Success {
            remote_resource_id,
            remote_url,
            duration_ms,
        } => {
            println!("uploaded {remote_resource_id} in {duration_ms}ms: {remote_url}");
            Ok(())
        }
        UploadResult::Failure {
            reason,
            detail,
            last_acknowledged_bytes,
        } => {
            eprintln!("{}", reason.describe());
            bail!("upload failed ({reason:?}) after {last_acknowledged_bytes} bytes: {detail}")
        }
    }
}

/// `dir/name.mp4` → (`dir`, `name.mp4`)
fn split_file(path: &Path) -> Result<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("not a file path: {}", path.display()))?;
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((root, name.to_string()))
}

fn load_credentials(path: &Path) -> Result<Vec<Credential>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

fn save_credentials(path: &Path, credentials: &[Credential]) -> Result<()> {
    let raw = serde_json::to_string_pretty(credentials)?;
    std::fs::write(path, raw).with_context(|| format!("write {}", path.display()))
}
