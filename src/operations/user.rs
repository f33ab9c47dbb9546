// 用户操作
// 注册以及头像、封面图的替换

use crate::AppState;
use crate::database::{NewUser, PublicUser};
use crate::error::AppError;
use crate::media::StagedFile;

const USERNAME_MIN_CHARS: usize = 3;
const USERNAME_MAX_CHARS: usize = 15;

/// 注册表单，文本字段已去除首尾空白
#[derive(Debug, Default)]
pub struct RegistrationInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<StagedFile>,
    pub cover_image: Option<StagedFile>,
}

pub struct UserOperation<'a> {
    state: &'a AppState,
}

impl<'a> UserOperation<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// 注册新用户
    ///
    /// 唯一性预检在任何上传之前完成；头像上传失败不创建用户，封面上传失败只记录日志。
    /// 创建记录失败时尽力删除已上传的远程资源。
    pub async fn register(&self, input: RegistrationInput) -> Result<PublicUser, AppError> {
        let (Some(username), Some(email), Some(full_name), Some(password)) =
            (input.username, input.email, input.full_name, input.password)
        else {
            return Err(AppError::Validation("所有字段均为必填项".into()));
        };

        let username = username.to_lowercase();
        let email = email.to_lowercase();
        let length = username.chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&length) {
            return Err(AppError::Validation(format!(
                "用户名长度必须在{}到{}个字符之间",
                USERNAME_MIN_CHARS, USERNAME_MAX_CHARS
            )));
        }

        let existing = self
            .state
            .users
            .find_by_username_or_email(Some(&username), Some(&email))
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("用户名或邮箱已被注册".into()));
        }

        let avatar = input
            .avatar
            .ok_or_else(|| AppError::Validation("头像为必填项".into()))?;
        let password_hash = self.state.hasher.hash(&password)?;

        let avatar = self.state.media.publish(avatar).await?;
        let cover_image = match input.cover_image {
            Some(staged) => match self.state.media.publish(staged).await {
                Ok(asset) => Some(asset),
                Err(e) => {
                    tracing::warn!("Cover image upload failed during registration: {}", e);
                    None
                }
            },
            None => None,
        };

        let created = self
            .state
            .users
            .create(NewUser {
                username,
                email,
                full_name,
                password_hash,
                avatar: avatar.url.clone(),
                cover_image: cover_image.as_ref().map(|c| c.url.clone()),
            })
            .await;

        match created {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Registered user {}", user.username);
                Ok(user)
            }
            Err(e) => {
                self.state.media.discard_remote(&avatar).await;
                if let Some(cover) = &cover_image {
                    self.state.media.discard_remote(cover).await;
                }
                Err(e.into())
            }
        }
    }

    pub async fn replace_avatar(
        &self,
        user: &PublicUser,
        staged: StagedFile,
    ) -> Result<PublicUser, AppError> {
        let current = self.current_profile(user).await?;
        let users = &self.state.users;
        let id = current.id;

        self.state
            .media
            .replace(Some(&current.avatar), staged, |asset| async move {
                users
                    .set_avatar(id, &asset.url)
                    .await
                    .map_err(AppError::from)
                    .and_then(|user| user.ok_or_else(|| AppError::NotFound("用户不存在".into())))
            })
            .await
    }

    pub async fn replace_cover_image(
        &self,
        user: &PublicUser,
        staged: StagedFile,
    ) -> Result<PublicUser, AppError> {
        let current = self.current_profile(user).await?;
        let users = &self.state.users;
        let id = current.id;

        self.state
            .media
            .replace(current.cover_image.as_deref(), staged, |asset| async move {
                users
                    .set_cover_image(id, &asset.url)
                    .await
                    .map_err(AppError::from)
                    .and_then(|user| user.ok_or_else(|| AppError::NotFound("用户不存在".into())))
            })
            .await
    }

    /// 替换前重新读取，避免用请求开始时的旧 URL 删除资源
    async fn current_profile(&self, user: &PublicUser) -> Result<PublicUser, AppError> {
        self.state
            .users
            .find_profile(user.id)
            .await?
            .ok_or_else(|| AppError::NotFound("用户不存在".into()))
    }
}
