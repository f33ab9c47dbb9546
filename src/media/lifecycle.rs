use std::future::Future;
use std::sync::Arc;

use crate::error::AppError;
use crate::media::staging::{StagedFile, StagingArea};
use crate::media::store::{MediaKind, MediaStore, RemoteAsset, public_id_from_url};

/// 媒体资源生命周期管理：暂存 → 远程上传 → 本地清理 → 替换时删除旧资源
pub struct MediaLifecycle {
    staging: StagingArea,
    store: Arc<dyn MediaStore>,
}

impl MediaLifecycle {
    pub fn new(staging: StagingArea, store: Arc<dyn MediaStore>) -> Self {
        Self { staging, store }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// 上传暂存文件；无论成功与否，返回前本地文件都已删除
    pub async fn publish(&self, staged: StagedFile) -> Result<RemoteAsset, AppError> {
        let original_name = staged.original_name().to_string();
        let result = self.store.upload(staged.path()).await;
        staged.discard().await;

        match result {
            Ok(asset) => {
                tracing::info!(
                    public_id = %asset.public_id,
                    kind = asset.kind.as_str(),
                    "Published {}",
                    original_name
                );
                Ok(asset)
            }
            Err(e) => {
                tracing::error!("Failed to publish {}: {}", original_name, e);
                Err(AppError::Upstream(format!(
                    "failed to upload {}: {}",
                    original_name, e
                )))
            }
        }
    }

    /// 替换资源
    ///
    /// 先上传新文件，再用新资源执行 `commit` 更新记录，最后删除旧资源。
    /// `commit` 失败时删除刚上传的新资源并保留旧资源；旧资源删除失败会作为
    /// 上游错误返回，但已提交的记录更新不会回滚。
    pub async fn replace<T, F, Fut>(
        &self,
        existing: Option<&str>,
        staged: StagedFile,
        commit: F,
    ) -> Result<T, AppError>
    where
        F: FnOnce(RemoteAsset) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let asset = self.publish(staged).await?;
        let fresh = asset.clone();

        let committed = match commit(asset).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    public_id = %fresh.public_id,
                    "Record update failed after upload, removing new asset"
                );
                self.discard_remote(&fresh).await;
                return Err(e);
            }
        };

        if let Some(url) = existing.filter(|url| *url != fresh.url) {
            self.delete(url).await?;
        }

        Ok(committed)
    }

    /// 按 URL 删除远程资源，资源类型决定删除接口
    pub async fn delete(&self, url: &str) -> Result<(), AppError> {
        let kind = MediaKind::from_url(url);
        let public_id = public_id_from_url(url, kind).ok_or_else(|| {
            tracing::error!("Cannot derive public id from {}", url);
            AppError::Upstream(format!("cannot derive public id from {}", url))
        })?;

        match self.store.delete(&public_id, kind).await {
            Ok(true) => {
                tracing::info!(public_id = %public_id, kind = kind.as_str(), "Deleted remote asset");
                Ok(())
            }
            Ok(false) => {
                tracing::error!(public_id = %public_id, "Remote store did not delete asset");
                Err(AppError::Upstream(format!(
                    "remote store did not delete {}",
                    public_id
                )))
            }
            Err(e) => {
                tracing::error!(public_id = %public_id, "Failed to delete remote asset: {}", e);
                Err(AppError::Upstream(format!(
                    "failed to delete {}: {}",
                    public_id, e
                )))
            }
        }
    }

    /// 尽力删除刚上传但未被任何记录引用的资源，失败只记录日志
    pub async fn discard_remote(&self, asset: &RemoteAsset) {
        match self.store.delete(&asset.public_id, asset.kind).await {
            Ok(true) => tracing::info!(public_id = %asset.public_id, "Discarded orphaned asset"),
            Ok(false) => tracing::warn!(
                public_id = %asset.public_id,
                "Remote store did not discard orphaned asset"
            ),
            Err(e) => tracing::warn!(
                public_id = %asset.public_id,
                "Failed to discard orphaned asset: {}",
                e
            ),
        }
    }
}
