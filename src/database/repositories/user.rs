use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::StoreError;
use crate::database::models::user::{NewUser, PublicUser, UserEntity};

const USER_COLUMNS: &str = "id, username, email, full_name, password_hash, avatar, cover_image, \
     refresh_token, created_at, updated_at";

const PUBLIC_USER_COLUMNS: &str =
    "id, username, email, full_name, avatar, cover_image, created_at, updated_at";

/// 用户存储接口
///
/// 只有 `find_by_username_or_email` 与 `find_by_id` 返回含凭据的完整实体，
/// 其余读取均使用公开字段投影。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按用户名或邮箱查找，任一匹配即返回
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserEntity>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, StoreError>;

    /// 只读取公开字段
    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError>;

    /// 创建用户，用户名或邮箱冲突时返回 `StoreError::Duplicate`
    async fn create(&self, user: NewUser) -> Result<PublicUser, StoreError>;

    /// 整值覆盖刷新令牌，`None` 表示注销
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), StoreError>;

    async fn set_avatar(&self, id: Uuid, url: &str) -> Result<Option<PublicUser>, StoreError>;

    async fn set_cover_image(&self, id: Uuid, url: &str)
    -> Result<Option<PublicUser>, StoreError>;
}

/// 基于 Postgres 的用户存储实现
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserEntity>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NOT NULL AND username = $1) \
                OR ($2::text IS NOT NULL AND email = $2) \
             LIMIT 1"
        );
        let user = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserEntity>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, UserEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError> {
        let sql = format!("SELECT {PUBLIC_USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, PublicUser>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<PublicUser, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, username, email, full_name, password_hash, avatar, cover_image) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PUBLIC_USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, PublicUser>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.full_name)
            .bind(&user.password_hash)
            .bind(&user.avatar)
            .bind(&user.cover_image)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(created) => {
                tracing::info!(user_id = %created.id, "Created user {}", created.username);
                Ok(created)
            }
            Err(e) => {
                tracing::error!("Failed to create user {}: {:?}", user.username, e);
                Err(StoreError::from_insert(e))
            }
        }
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET refresh_token = $1, updated_at = now() WHERE id = $2")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_avatar(&self, id: Uuid, url: &str) -> Result<Option<PublicUser>, StoreError> {
        let sql = format!(
            "UPDATE users SET avatar = $1, updated_at = now() WHERE id = $2 \
             RETURNING {PUBLIC_USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, PublicUser>(&sql)
            .bind(url)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn set_cover_image(
        &self,
        id: Uuid,
        url: &str,
    ) -> Result<Option<PublicUser>, StoreError> {
        let sql = format!(
            "UPDATE users SET cover_image = $1, updated_at = now() WHERE id = $2 \
             RETURNING {PUBLIC_USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, PublicUser>(&sql)
            .bind(url)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }
}
