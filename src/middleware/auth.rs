use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{
    AppState,
    auth::{TokenAuthority, TokenError, TokenKind},
    database::{PublicUser, UserStore},
    error::AppError,
};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// 从请求中取出访问令牌：优先 Cookie，其次 `Authorization: Bearer`
fn access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    jar.get(ACCESS_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| {
            headers
                .typed_get::<Authorization<Bearer>>()
                .map(|auth| auth.token().to_string())
        })
}

/// 校验访问令牌并解析为用户公开信息，不产生任何副作用
pub async fn authenticate(
    tokens: &TokenAuthority,
    users: &dyn UserStore,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<PublicUser, AppError> {
    let token = access_token(jar, headers)
        .ok_or_else(|| AppError::Unauthorized("未授权的请求".into()))?;

    let claims = tokens
        .verify(&token, TokenKind::Access)
        .map_err(|e| match e {
            TokenError::Expired => AppError::Unauthorized("访问令牌已过期".into()),
            _ => AppError::Unauthorized("无效的访问令牌".into()),
        })?;
    let user_id = claims.user_id()?;

    users
        .find_profile(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("无效的访问令牌".into()))
}

/// 认证中间件，通过后把 `PublicUser` 放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state.tokens, state.users.as_ref(), &jar, request.headers()).await?;
    tracing::debug!(user_id = %user.id, "Authenticated request");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use axum::http::header;
    use axum_extra::extract::cookie::Cookie;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn cookie_takes_precedence_over_header() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("alice", "alice@example.com", "pw").await;
        let token = ctx.state.tokens.issue_access_token(user.id).unwrap();
        let jar = CookieJar::new().add(Cookie::new(ACCESS_TOKEN_COOKIE, token));

        let resolved = authenticate(
            &ctx.state.tokens,
            ctx.state.users.as_ref(),
            &jar,
            &bearer("garbage"),
        )
        .await
        .unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn bearer_header_is_accepted() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("alice", "alice@example.com", "pw").await;
        let token = ctx.state.tokens.issue_access_token(user.id).unwrap();

        let resolved = authenticate(
            &ctx.state.tokens,
            ctx.state.users.as_ref(),
            &CookieJar::new(),
            &bearer(&token),
        )
        .await
        .unwrap();
        assert_eq!(resolved.username, "alice");
    }

    #[tokio::test]
    async fn rejects_missing_refresh_and_unknown_user_tokens() {
        let ctx = TestContext::new();
        let user = ctx.seed_user("alice", "alice@example.com", "pw").await;
        let refresh = ctx.state.tokens.issue_refresh_token(user.id).unwrap();
        let orphan = ctx
            .state
            .tokens
            .issue_access_token(uuid::Uuid::new_v4())
            .unwrap();
        let jar = CookieJar::new();

        for headers in [HeaderMap::new(), bearer(&refresh), bearer(&orphan)] {
            let err = authenticate(&ctx.state.tokens, ctx.state.users.as_ref(), &jar, &headers)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
    }
}
