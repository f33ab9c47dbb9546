use axum::{
    extract::{Extension, Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    AppState,
    database::PublicUser,
    error::AppError,
    media::UploadForm,
    operations::{PublishVideoInput, UpdateVideoInput, VideoOperation},
    utils::success_to_api_response,
};

use super::model::DeletedVideo;

#[axum::debug_handler]
pub async fn publish_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::from_multipart(multipart, state.media.staging()).await?;
    let input = PublishVideoInput {
        title: form.text("title"),
        description: form.text("description"),
        video_file: form.take_file("videoFile"),
        thumbnail: form.take_file("thumbnail"),
    };

    let video = VideoOperation::new(&state).publish(user.id, input).await?;
    Ok(success_to_api_response(
        StatusCode::CREATED,
        video,
        "视频发布成功",
    ))
}

#[axum::debug_handler]
pub async fn get_video(
    State(state): State<AppState>,
    WithRejection(Path(video_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let video = VideoOperation::new(&state).get(video_id).await?;
    Ok(success_to_api_response(StatusCode::OK, video, "视频获取成功"))
}

#[axum::debug_handler]
pub async fn update_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    WithRejection(Path(video_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(multipart, _): WithRejection<Multipart, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::from_multipart(multipart, state.media.staging()).await?;
    let input = UpdateVideoInput {
        title: form.text("title"),
        description: form.text("description"),
        thumbnail: form.take_file("thumbnail"),
    };

    let video = VideoOperation::new(&state)
        .update(user.id, video_id, input)
        .await?;
    Ok(success_to_api_response(StatusCode::OK, video, "视频更新成功"))
}

#[axum::debug_handler]
pub async fn delete_video(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    WithRejection(Path(video_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let video = VideoOperation::new(&state).delete(user.id, video_id).await?;
    Ok(success_to_api_response(
        StatusCode::OK,
        DeletedVideo { id: video.id },
        "视频删除成功",
    ))
}

#[axum::debug_handler]
pub async fn toggle_publish_status(
    State(state): State<AppState>,
    Extension(user): Extension<PublicUser>,
    WithRejection(Path(video_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let video = VideoOperation::new(&state)
        .toggle_publish(user.id, video_id)
        .await?;
    let message = if video.is_published {
        "视频已发布"
    } else {
        "视频已取消发布"
    };
    Ok(success_to_api_response(StatusCode::OK, video, message))
}
