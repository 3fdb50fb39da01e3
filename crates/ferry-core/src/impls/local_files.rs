//! LocalFileSource - 一時ストレージ（ローカルディレクトリ）上の動画ファイル
//!
//! ファイル ID はルートディレクトリ直下のファイル名だけを受け付けます。
//! パス区切り・`..`・絶対パスは `FileError::InvalidId`。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;

use crate::domain::FileError;
use crate::ports::{ByteStream, FileSource};

#[derive(Debug, Clone)]
pub struct LocalFileSource {
    root: PathBuf,
}

impl LocalFileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, file_id: &str) -> Result<PathBuf, FileError> {
        let invalid = file_id.is_empty()
            || file_id == "."
            || file_id == ".."
            || file_id.contains('/')
            || file_id.contains('\\')
            || file_id.contains('\0')
            || Path::new(file_id).is_absolute();
        if invalid {
            return Err(FileError::InvalidId(file_id.to_string()));
        }
        Ok(self.root.join(file_id))
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    async fn open_stream(&self, file_id: &str) -> Result<(Box<dyn ByteStream>, u64), FileError> {
        let path = self.resolve(file_id)?;
        let file = File::open(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => FileError::NotFound(file_id.to_string()),
            _ => FileError::Io(err),
        })?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(FileError::NotFound(file_id.to_string()));
        }
        Ok((Box::new(file), metadata.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn opens_file_and_reports_length() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"0123456789").unwrap();
        let source = LocalFileSource::new(dir.path());

        let (mut stream, len) = source.open_stream("clip.mp4").await.unwrap();
        assert_eq!(len, 10);
        let mut content = Vec::new();
        stream.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"0123456789");
    }

    #[tokio::test]
    async fn dots_inside_a_name_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("take..2.mp4"), b"x").unwrap();
        let source = LocalFileSource::new(dir.path());
        assert_eq!(source.open_stream("take..2.mp4").await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalFileSource::new(dir.path());
        assert!(matches!(
            source.open_stream("gone.mp4").await,
            Err(FileError::NotFound(id)) if id == "gone.mp4"
        ));
    }

    #[tokio::test]
    async fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let source = LocalFileSource::new(dir.path());
        assert!(matches!(source.open_stream("sub").await, Err(FileError::NotFound(_))));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("sub/clip.mp4")]
    #[case("..\\clip.mp4")]
    #[case("/etc/passwd")]
    #[tokio::test]
    async fn traversal_ids_are_rejected(#[case] file_id: &str) {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalFileSource::new(dir.path());
        assert!(matches!(
            source.open_stream(file_id).await,
            Err(FileError::InvalidId(_))
        ));
    }
}
