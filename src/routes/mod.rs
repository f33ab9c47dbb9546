// 路由模块
// 公开路由与需要认证的路由统一挂载在 API 前缀之下

pub mod user;
pub mod video;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

use crate::{AppState, config::HttpSettings, middleware::auth_middleware};

pub fn create_router(state: AppState, http: &HttpSettings) -> Router {
    let public_routes = Router::new()
        .route("/users/register", post(user::register))
        .route("/users/login", post(user::login))
        .route("/users/refresh-token", post(user::refresh_token));

    let protected_routes = Router::new()
        // 需要认证的用户路由
        .route("/users/logout", post(user::logout))
        .route("/users/current-user", get(user::current_user))
        .route("/users/avatar", patch(user::update_avatar))
        .route("/users/cover-image", patch(user::update_cover_image))
        // 视频路由
        .route("/videos", post(video::publish_video))
        .route(
            "/videos/{id}",
            get(video::get_video)
                .patch(video::update_video)
                .delete(video::delete_video),
        )
        .route(
            "/videos/toggle/publish/{id}",
            patch(video::toggle_publish_status),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest(
            &http.api_base_uri,
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .layer(DefaultBodyLimit::max(http.max_upload_bytes))
        .with_state(state)
}
