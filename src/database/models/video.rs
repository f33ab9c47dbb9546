use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 视频数据库实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    /// 时长（秒），来自媒体托管服务的上传结果
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub owner_id: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
}

/// 视频详情更新，`thumbnail` 为空时保留原封面
#[derive(Debug, Clone)]
pub struct VideoUpdate {
    pub title: String,
    pub description: String,
    pub thumbnail: Option<String>,
}
