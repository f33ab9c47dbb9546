// 视频操作
// 发布、查询、更新、删除与切换发布状态，只有视频所有者可以修改

use uuid::Uuid;

use crate::AppState;
use crate::database::{NewVideo, VideoEntity, VideoUpdate};
use crate::error::AppError;
use crate::media::StagedFile;

#[derive(Debug, Default)]
pub struct PublishVideoInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_file: Option<StagedFile>,
    pub thumbnail: Option<StagedFile>,
}

#[derive(Debug, Default)]
pub struct UpdateVideoInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<StagedFile>,
}

pub struct VideoOperation<'a> {
    state: &'a AppState,
}

impl<'a> VideoOperation<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// 发布视频：先上传视频文件再上传封面，任一步失败都会清理已上传的资源
    pub async fn publish(
        &self,
        owner_id: Uuid,
        input: PublishVideoInput,
    ) -> Result<VideoEntity, AppError> {
        let (title, description) = required_details(input.title, input.description)?;
        let video_file = input
            .video_file
            .ok_or_else(|| AppError::Validation("请上传视频文件".into()))?;
        let thumbnail = input
            .thumbnail
            .ok_or_else(|| AppError::Validation("请上传封面图片".into()))?;

        let media = &self.state.media;
        let video_asset = media.publish(video_file).await?;
        let thumbnail_asset = match media.publish(thumbnail).await {
            Ok(asset) => asset,
            Err(e) => {
                media.discard_remote(&video_asset).await;
                return Err(e);
            }
        };

        let created = self
            .state
            .videos
            .create(NewVideo {
                owner_id,
                video_file: video_asset.url.clone(),
                thumbnail: thumbnail_asset.url.clone(),
                title,
                description,
                duration: video_asset.duration.unwrap_or_default(),
            })
            .await;

        match created {
            Ok(video) => {
                tracing::info!(video_id = %video.id, owner_id = %owner_id, "Published video");
                Ok(video)
            }
            Err(e) => {
                media.discard_remote(&video_asset).await;
                media.discard_remote(&thumbnail_asset).await;
                Err(e.into())
            }
        }
    }

    pub async fn get(&self, video_id: Uuid) -> Result<VideoEntity, AppError> {
        self.state
            .videos
            .find_by_id(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("视频不存在".into()))
    }

    /// 更新标题与描述；提供新封面时按替换流程处理旧封面
    pub async fn update(
        &self,
        owner_id: Uuid,
        video_id: Uuid,
        input: UpdateVideoInput,
    ) -> Result<VideoEntity, AppError> {
        let (title, description) = required_details(input.title, input.description)?;
        let video = self.owned(owner_id, video_id).await?;
        let videos = &self.state.videos;

        let Some(staged) = input.thumbnail else {
            return videos
                .update_details(
                    video_id,
                    VideoUpdate {
                        title,
                        description,
                        thumbnail: None,
                    },
                )
                .await?
                .ok_or_else(|| AppError::NotFound("视频不存在".into()));
        };

        self.state
            .media
            .replace(Some(&video.thumbnail), staged, |asset| async move {
                videos
                    .update_details(
                        video_id,
                        VideoUpdate {
                            title,
                            description,
                            thumbnail: Some(asset.url),
                        },
                    )
                    .await
                    .map_err(AppError::from)
                    .and_then(|video| video.ok_or_else(|| AppError::NotFound("视频不存在".into())))
            })
            .await
    }

    /// 先删除记录，再删除视频文件与封面；远程删除失败不会恢复记录
    pub async fn delete(&self, owner_id: Uuid, video_id: Uuid) -> Result<VideoEntity, AppError> {
        self.owned(owner_id, video_id).await?;
        let video = self
            .state
            .videos
            .delete(video_id)
            .await?
            .ok_or_else(|| AppError::NotFound("视频不存在".into()))?;

        let media = &self.state.media;
        let file_result = media.delete(&video.video_file).await;
        let thumbnail_result = media.delete(&video.thumbnail).await;
        file_result.and(thumbnail_result)?;

        tracing::info!(video_id = %video_id, "Deleted video");
        Ok(video)
    }

    pub async fn toggle_publish(
        &self,
        owner_id: Uuid,
        video_id: Uuid,
    ) -> Result<VideoEntity, AppError> {
        let video = self.owned(owner_id, video_id).await?;
        self.state
            .videos
            .set_published(video_id, !video.is_published)
            .await?
            .ok_or_else(|| AppError::NotFound("视频不存在".into()))
    }

    async fn owned(&self, owner_id: Uuid, video_id: Uuid) -> Result<VideoEntity, AppError> {
        let video = self.get(video_id).await?;
        if video.owner_id != owner_id {
            tracing::warn!(video_id = %video_id, user_id = %owner_id, "Rejected non-owner access");
            return Err(AppError::Forbidden("无权操作该视频".into()));
        }
        Ok(video)
    }
}

fn required_details(
    title: Option<String>,
    description: Option<String>,
) -> Result<(String, String), AppError> {
    match (title, description) {
        (Some(title), Some(description)) => Ok((title, description)),
        _ => Err(AppError::Validation("请提供标题和描述".into())),
    }
}
