//! 内存存储实现，用于未配置 `DATABASE_URL` 的本地开发与测试。
//!
//! 唯一性检查与插入在同一把写锁内完成，行为与数据库唯一索引一致。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::StoreError;
use crate::database::models::user::{NewUser, PublicUser, UserEntity};
use crate::database::models::video::{NewVideo, VideoEntity, VideoUpdate};
use crate::database::repositories::{UserStore, VideoStore};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, UserEntity>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前保存的刷新令牌
    pub async fn stored_refresh_token(&self, id: Uuid) -> Option<String> {
        self.users
            .read()
            .await
            .get(&id)
            .and_then(|u| u.refresh_token.clone())
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> Option<PublicUser>
    where
        F: FnOnce(&mut UserEntity),
    {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id)?;
        apply(user);
        user.updated_at = Utc::now();
        Some(user.clone().into())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserEntity>, StoreError> {
        let users = self.users.read().await;
        let found = users.values().find(|u| {
            username.is_some_and(|name| u.username == name)
                || email.is_some_and(|mail| u.email == mail)
        });
        Ok(found.cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned().map(PublicUser::from))
    }

    async fn create(&self, user: NewUser) -> Result<PublicUser, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("users_username_key".into()));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }

        let now = Utc::now();
        let entity = UserEntity {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            password_hash: user.password_hash,
            avatar: user.avatar,
            cover_image: user.cover_image,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(entity.id, entity.clone());

        Ok(entity.into())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), StoreError> {
        let token = token.map(str::to_string);
        self.update(id, |u| u.refresh_token = token).await;
        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, url: &str) -> Result<Option<PublicUser>, StoreError> {
        Ok(self.update(id, |u| u.avatar = url.to_string()).await)
    }

    async fn set_cover_image(
        &self,
        id: Uuid,
        url: &str,
    ) -> Result<Option<PublicUser>, StoreError> {
        Ok(self
            .update(id, |u| u.cover_image = Some(url.to_string()))
            .await)
    }
}

#[derive(Default)]
pub struct MemoryVideoStore {
    videos: RwLock<HashMap<Uuid, VideoEntity>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> Option<VideoEntity>
    where
        F: FnOnce(&mut VideoEntity),
    {
        let mut videos = self.videos.write().await;
        let video = videos.get_mut(&id)?;
        apply(video);
        video.updated_at = Utc::now();
        Some(video.clone())
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn create(&self, video: NewVideo) -> Result<VideoEntity, StoreError> {
        let now = Utc::now();
        let entity = VideoEntity {
            id: Uuid::new_v4(),
            owner_id: video.owner_id,
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            title: video.title,
            description: video.description,
            duration: video.duration,
            views: 0,
            is_published: true,
            created_at: now,
            updated_at: now,
        };
        self.videos.write().await.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VideoEntity>, StoreError> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn update_details(
        &self,
        id: Uuid,
        update: VideoUpdate,
    ) -> Result<Option<VideoEntity>, StoreError> {
        Ok(self
            .update(id, |v| {
                v.title = update.title;
                v.description = update.description;
                if let Some(thumbnail) = update.thumbnail {
                    v.thumbnail = thumbnail;
                }
            })
            .await)
    }

    async fn set_published(
        &self,
        id: Uuid,
        published: bool,
    ) -> Result<Option<VideoEntity>, StoreError> {
        Ok(self.update(id, |v| v.is_published = published).await)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<VideoEntity>, StoreError> {
        Ok(self.videos.write().await.remove(&id))
    }
}
