use std::path::{Path, PathBuf};

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to write staged file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload stream failed: {0}")]
    Stream(String),
}

/// 上传文件的本地暂存目录
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 将上传的字节流写入暂存目录
    ///
    /// 文件名由字段名、毫秒时间戳、随机后缀与原始扩展名组成，不检查内容。
    /// 写入中途失败时半成品文件随 `StagedFile` 一起被删除。
    pub async fn stage<S, B, E>(
        &self,
        field_name: &str,
        original_name: &str,
        body: S,
    ) -> Result<StagedFile, StagingError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::fmt::Display,
    {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StagingError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let stored_name = unique_filename(field_name, original_name);
        let path = self.dir.join(&stored_name);
        let mut file = fs::File::create(&path)
            .await
            .map_err(|source| StagingError::Io {
                path: path.clone(),
                source,
            })?;

        let mut staged = StagedFile {
            path,
            original_name: original_name.to_string(),
            stored_name,
            size: 0,
            removed: false,
        };

        let mut body = std::pin::pin!(body);
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| StagingError::Stream(e.to_string()))?;
            let bytes = chunk.as_ref();
            file.write_all(bytes)
                .await
                .map_err(|source| StagingError::Io {
                    path: staged.path.clone(),
                    source,
                })?;
            staged.size += bytes.len() as u64;
        }
        file.flush().await.map_err(|source| StagingError::Io {
            path: staged.path.clone(),
            source,
        })?;

        tracing::debug!(
            path = %staged.path.display(),
            size_bytes = staged.size,
            "Staged upload {}",
            staged.original_name
        );
        Ok(staged)
    }
}

/// 暂存在本地的上传文件
///
/// 不可克隆，只能被一次远程上传消费；未被消费就被丢弃时同步删除本地文件。
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    original_name: String,
    stored_name: String,
    size: u64,
    removed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn stored_name(&self) -> &str {
        &self.stored_name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// 删除本地文件
    pub async fn discard(mut self) {
        self.removed = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "Failed to remove staged file: {}",
                e
            ),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed unused staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                "Failed to remove unused staged file: {}",
                e
            ),
        }
    }
}

fn unique_filename(field_name: &str, original_name: &str) -> String {
    let prefix: String = field_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let prefix = if prefix.is_empty() { "file".to_string() } else { prefix };
    let suffix = format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        rand::random_range(0..1_000_000_000u32)
    );

    match extension_of(original_name) {
        Some(ext) => format!("{prefix}-{suffix}.{ext}"),
        None => format!("{prefix}-{suffix}"),
    }
}

fn extension_of(original_name: &str) -> Option<String> {
    let (_, ext) = original_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let valid = !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tempfile::tempdir;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<&'static [u8], std::io::Error>> {
        stream::iter(parts.iter().map(|p| Ok(*p)).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn stages_stream_with_unique_name() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("temp"));

        let first = staging
            .stage("avatar", "me.PNG", chunks(&[b"hello ", b"world"]))
            .await
            .unwrap();
        let second = staging
            .stage("avatar", "me.PNG", chunks(&[b"again"]))
            .await
            .unwrap();

        assert!(first.stored_name().starts_with("avatar-"));
        assert!(first.stored_name().ends_with(".png"));
        assert_ne!(first.stored_name(), second.stored_name());
        assert_eq!(first.original_name(), "me.PNG");
        assert_eq!(first.size(), 11);
        assert_eq!(std::fs::read(first.path()).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn discard_and_drop_remove_the_file() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());

        let discarded = staging.stage("a", "x.jpg", chunks(&[b"1"])).await.unwrap();
        let discarded_path = discarded.path().to_path_buf();
        discarded.discard().await;
        assert!(!discarded_path.exists());

        let dropped = staging.stage("a", "y.jpg", chunks(&[b"2"])).await.unwrap();
        let dropped_path = dropped.path().to_path_buf();
        drop(dropped);
        assert!(!dropped_path.exists());
    }

    #[tokio::test]
    async fn failed_stream_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let body = stream::iter(vec![
            Ok::<&[u8], std::io::Error>(b"partial"),
            Err(std::io::Error::other("connection reset")),
        ]);

        let result = staging.stage("video", "clip.mp4", body).await;
        assert!(matches!(result, Err(StagingError::Stream(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(extension_of("clip.MP4").as_deref(), Some("mp4"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("evil.p/h"), None);
        assert!(!unique_filename("../x", "a.png").contains('/'));
    }
}
