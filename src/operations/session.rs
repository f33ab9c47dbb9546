// 会话操作
// 登录、注销与刷新令牌轮换

use uuid::Uuid;

use crate::AppState;
use crate::auth::{TokenError, TokenKind, TokenPair};
use crate::database::PublicUser;
use crate::error::AppError;

/// 登录凭据，用户名与邮箱至少提供一个
#[derive(Debug, Clone, Default)]
pub struct LoginCredentials {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

pub struct SessionOperation<'a> {
    state: &'a AppState,
}

impl<'a> SessionOperation<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn login(&self, credentials: LoginCredentials) -> Result<LoginOutcome, AppError> {
        let username = credentials.username.map(|u| u.to_lowercase());
        let email = credentials.email.map(|e| e.to_lowercase());
        if username.is_none() && email.is_none() {
            return Err(AppError::Validation("需要提供用户名或邮箱".into()));
        }
        if credentials.password.is_empty() {
            return Err(AppError::Validation("密码不能为空".into()));
        }

        let user = self
            .state
            .users
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound("用户不存在".into()))?;

        if !self
            .state
            .hasher
            .verify(&credentials.password, &user.password_hash)
        {
            tracing::info!(user_id = %user.id, "Rejected login with wrong password");
            return Err(AppError::Unauthorized("用户凭据无效".into()));
        }

        let tokens = self.rotate(user.id).await?;
        tracing::info!(user_id = %user.id, "User {} logged in", user.username);

        Ok(LoginOutcome {
            user: user.into(),
            tokens,
        })
    }

    /// 清除保存的刷新令牌，重复调用无副作用
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.state.users.set_refresh_token(user_id, None).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// 用刷新令牌换取新的令牌对，旧刷新令牌随即失效
    pub async fn refresh(&self, presented: &str) -> Result<TokenPair, AppError> {
        let claims = self
            .state
            .tokens
            .verify(presented, TokenKind::Refresh)
            .map_err(|e| match e {
                TokenError::Expired => AppError::Unauthorized("刷新令牌已过期".into()),
                TokenError::Invalid => AppError::Unauthorized("无效的刷新令牌".into()),
                other => other.into(),
            })?;
        let user_id = claims.user_id()?;

        let user = self
            .state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("无效的刷新令牌".into()))?;

        // 并发刷新时两个请求可能都通过此比较，后写入者的令牌生效
        if user.refresh_token.as_deref() != Some(presented) {
            tracing::warn!(user_id = %user_id, "Refresh token does not match the stored one");
            return Err(AppError::Unauthorized("刷新令牌已过期或已被使用".into()));
        }

        let tokens = self.rotate(user_id).await?;
        tracing::debug!(user_id = %user_id, "Rotated refresh token");
        Ok(tokens)
    }

    async fn rotate(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        let tokens = self.state.tokens.issue_pair(user_id)?;
        self.state
            .users
            .set_refresh_token(user_id, Some(&tokens.refresh_token))
            .await?;
        Ok(tokens)
    }
}
