use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::StoreError;
use crate::database::models::video::{NewVideo, VideoEntity, VideoUpdate};

const VIDEO_COLUMNS: &str = "id, owner_id, video_file, thumbnail, title, description, duration, \
     views, is_published, created_at, updated_at";

/// 视频存储接口
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create(&self, video: NewVideo) -> Result<VideoEntity, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VideoEntity>, StoreError>;

    async fn update_details(
        &self,
        id: Uuid,
        update: VideoUpdate,
    ) -> Result<Option<VideoEntity>, StoreError>;

    async fn set_published(
        &self,
        id: Uuid,
        published: bool,
    ) -> Result<Option<VideoEntity>, StoreError>;

    /// 删除记录并返回被删除的视频
    async fn delete(&self, id: Uuid) -> Result<Option<VideoEntity>, StoreError>;
}

#[derive(Clone)]
pub struct PgVideoStore {
    pool: PgPool,
}

impl PgVideoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    async fn create(&self, video: NewVideo) -> Result<VideoEntity, StoreError> {
        let sql = format!(
            "INSERT INTO videos (id, owner_id, video_file, thumbnail, title, description, duration) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {VIDEO_COLUMNS}"
        );
        let created = sqlx::query_as::<_, VideoEntity>(&sql)
            .bind(Uuid::new_v4())
            .bind(video.owner_id)
            .bind(&video.video_file)
            .bind(&video.thumbnail)
            .bind(&video.title)
            .bind(&video.description)
            .bind(video.duration)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VideoEntity>, StoreError> {
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1");
        let video = sqlx::query_as::<_, VideoEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(video)
    }

    async fn update_details(
        &self,
        id: Uuid,
        update: VideoUpdate,
    ) -> Result<Option<VideoEntity>, StoreError> {
        let sql = format!(
            "UPDATE videos \
             SET title = $1, description = $2, thumbnail = COALESCE($3, thumbnail), updated_at = now() \
             WHERE id = $4 \
             RETURNING {VIDEO_COLUMNS}"
        );
        let video = sqlx::query_as::<_, VideoEntity>(&sql)
            .bind(&update.title)
            .bind(&update.description)
            .bind(&update.thumbnail)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(video)
    }

    async fn set_published(
        &self,
        id: Uuid,
        published: bool,
    ) -> Result<Option<VideoEntity>, StoreError> {
        let sql = format!(
            "UPDATE videos SET is_published = $1, updated_at = now() WHERE id = $2 \
             RETURNING {VIDEO_COLUMNS}"
        );
        let video = sqlx::query_as::<_, VideoEntity>(&sql)
            .bind(published)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(video)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<VideoEntity>, StoreError> {
        let sql = format!("DELETE FROM videos WHERE id = $1 RETURNING {VIDEO_COLUMNS}");
        let video = sqlx::query_as::<_, VideoEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(video)
    }
}
