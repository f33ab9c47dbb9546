use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::TokenSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub jti: String, // 令牌唯一标识，保证同一秒内签发的令牌互不相同
    pub iat: i64,    // 签发时间
    pub exp: i64,    // 过期时间
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// 签名错误、格式错误或使用了另一类令牌的密钥
    #[error("token is invalid")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    fn new(secret: &str, ttl: std::time::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }
}

/// 令牌签发与校验
///
/// 访问令牌与刷新令牌使用两套独立密钥，任一密钥泄露只影响一类令牌。
/// 刷新令牌的有效性还要求与用户记录上保存的值一致，该检查由会话操作完成。
#[derive(Clone)]
pub struct TokenAuthority {
    access: TokenKeys,
    refresh: TokenKeys,
    validation: Validation,
}

impl TokenAuthority {
    pub fn new(settings: &TokenSettings) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            access: TokenKeys::new(&settings.access_secret, settings.access_ttl),
            refresh: TokenKeys::new(&settings.refresh_secret, settings.refresh_ttl),
            validation,
        }
    }

    fn keys(&self, kind: TokenKind) -> &TokenKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(TokenKind::Access, user_id)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(TokenKind::Refresh, user_id)
    }

    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(user_id)?,
            refresh_token: self.issue_refresh_token(user_id)?,
        })
    }

    fn issue(&self, kind: TokenKind, user_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.keys(kind).ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.sign(kind, user_id, now, expires_at)
    }

    fn sign(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::default(), &claims, &self.keys(kind).encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// 校验签名与过期时间，过期与无效分别返回不同错误
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}
