use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::{
    CookieJar, WithRejection,
    cookie::{Cookie, SameSite},
};

use crate::{
    AppState,
    auth::TokenPair,
    database::PublicUser,
    error::AppError,
    media::UploadForm,
    middleware::ACCESS_TOKEN_COOKIE,
    operations::{LoginCredentials, RegistrationInput, SessionOperation, UserOperation},
    utils::{non_empty, success_to_api_response},
};

use super::model::{LoginRequest, LoginResponse, RefreshTokenRequest};

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn token_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// 立即过期的同名 Cookie，用于注销时清除客户端令牌
fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = token_cookie(name, String::new());
    cookie.make_removal();
    cookie
}

fn with_token_cookies(jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(token_cookie(ACCESS_TOKEN_COOKIE, tokens.access_token.clone()))
        .add(token_cookie(REFRESH_TOKEN_COOKIE, tokens.refresh_token.clone()))
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::from_multipart(multipart, state.media.staging()).await?;
    let input = RegistrationInput {
        username: form.text("username"),
        email: form.text("email"),
        full_name: form.text("fullName"),
        password: form.raw_text("password"),
        avatar: form.take_file("avatar"),
        cover_image: form.take_file("coverImage"),
    };

    let user = UserOperation::new(&state).register(input).await?;
    Ok(success_to_api_response(
        StatusCode::CREATED,
        user,
        "用户注册成功",
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = SessionOperation::new(&state)
        .login(LoginCredentials {
            username: non_empty(req.username.as_deref()),
            email: non_empty(req.email.as_deref()),
            password: req.password,
        })
        .await?;

    let jar = with_token_cookies(jar, &outcome.tokens);
    Ok((
        jar,
        success_to_api_response(
            StatusCode::OK,
            LoginResponse {
                user: outcome.user,
                access_token: outcome.tokens.access_token,
                refresh_token: outcome.tokens.refresh_token,
            },
            "登录成功",
        ),
    ))
}

#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    SessionOperation::new(&state).logout(user.id).await?;

    let jar = jar
        .add(expired_cookie(ACCESS_TOKEN_COOKIE))
        .add(expired_cookie(REFRESH_TOKEN_COOKIE));
    Ok((
        jar,
        success_to_api_response(StatusCode::OK, serde_json::json!({}), "已退出登录"),
    ))
}

/// 刷新令牌优先从 Cookie 读取，其次读取 JSON 请求体中的 `refreshToken`
#[axum::debug_handler]
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let from_cookie = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let presented = match from_cookie {
        Some(token) => token,
        None => {
            let from_body = if body.iter().all(u8::is_ascii_whitespace) {
                None
            } else {
                serde_json::from_slice::<RefreshTokenRequest>(&body)
                    .map_err(|e| AppError::Validation(format!("请求体格式无效: {}", e)))?
                    .refresh_token
            };
            non_empty(from_body.as_deref())
                .ok_or_else(|| AppError::Unauthorized("未授权的请求".into()))?
        }
    };

    let tokens = SessionOperation::new(&state).refresh(&presented).await?;
    let jar = with_token_cookies(jar, &tokens);
    Ok((
        jar,
        success_to_api_response(StatusCode::OK, tokens, "访问令牌已刷新"),
    ))
}

#[axum::debug_handler]
pub async fn current_user(Extension(user): Extension<PublicUser>) -> impl IntoResponse {
    success_to_api_response(StatusCode::OK, user, "当前用户获取成功")
}

#[axum::debug_handler]
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::from_multipart(multipart, state.media.staging()).await?;
    let staged = form
        .take_file("avatar")
        .ok_or_else(|| AppError::Validation("头像文件缺失".into()))?;

    let updated = UserOperation::new(&state)
        .replace_avatar(&user, staged)
        .await?;
    Ok(success_to_api_response(
        StatusCode::OK,
        updated,
        "头像更新成功",
    ))
}

#[axum::debug_handler]
pub async fn update_cover_image(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::from_multipart(multipart, state.media.staging()).await?;
    let staged = form
        .take_file("coverImage")
        .ok_or_else(|| AppError::Validation("封面图片文件缺失".into()))?;

    let updated = UserOperation::new(&state)
        .replace_cover_image(&user, staged)
        .await?;
    Ok(success_to_api_response(
        StatusCode::OK,
        updated,
        "封面图片更新成功",
    ))
}
