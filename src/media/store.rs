//! 远程媒体存储抽象
//!
//! 远程存储持有上传后的资源，记录中只保存资源 URL。删除资源需要 public id 与资源类型，
//! 两者都从 URL 中还原。

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Raw,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Raw => "raw",
        }
    }

    /// 远程存储返回的资源类型，未知值按 raw 处理
    pub fn from_resource_type(value: &str) -> Self {
        match value {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => MediaKind::Raw,
        }
    }

    /// 已存储资源的类型
    ///
    /// 访问 URL 中 `/upload/` 前一段即为类型；没有该段时按扩展名判断，默认为图片。
    pub fn from_url(url: &str) -> Self {
        for kind in [MediaKind::Image, MediaKind::Video, MediaKind::Raw] {
            if url.contains(&format!("/{}/upload/", kind.as_str())) {
                return kind;
            }
        }

        let path = url.split(['?', '#']).next().unwrap_or(url);
        let extension = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("mp4" | "mkv" | "mov" | "avi") => MediaKind::Video,
            Some("mp3" | "wav") => MediaKind::Raw,
            _ => MediaKind::Image,
        }
    }
}

/// 远程存储中的一个资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAsset {
    pub public_id: String,
    pub url: String,
    pub kind: MediaKind,
    /// 音视频时长，单位为秒
    pub duration: Option<f64>,
    pub bytes: Option<u64>,
}

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("failed to read staged file: {0}")]
    Io(#[from] std::io::Error),

    #[error("media store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("media store rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// 上传本地文件，本地文件由调用方负责删除
    async fn upload(&self, path: &Path) -> Result<RemoteAsset, MediaStoreError>;

    /// 返回远程存储是否确认资源已删除
    async fn delete(&self, public_id: &str, kind: MediaKind) -> Result<bool, MediaStoreError>;
}

/// 从访问 URL 中提取 public id
///
/// `https://res.cloudinary.com/<cloud>/video/upload/v1712/folder/clip.mp4` 得到 `folder/clip`。
/// raw 资源的 public id 包含扩展名，此时保留扩展名。
pub fn public_id_from_url(url: &str, kind: MediaKind) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let (_, rest) = path.split_once("/upload/")?;

    let mut segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments
        .first()
        .is_some_and(|s| s.len() > 1 && s.starts_with('v') && s[1..].bytes().all(|b| b.is_ascii_digit()))
    {
        segments.remove(0);
    }

    let last = segments.pop()?;
    if kind == MediaKind::Raw {
        segments.push(last);
        return Some(segments.join("/"));
    }
    let stem = match last.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => last,
    };
    segments.push(stem);

    Some(segments.join("/"))
}
