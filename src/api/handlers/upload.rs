use crate::AppState;
use crate::api::error::AppError;
use crate::utils::auth::Claims;
use crate::utils::validation::{
    VIDEO_MP4, parse_media_type, thumbnail_extension, video_extension,
};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    extract::multipart::{Field, MultipartError},
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::{info, warn};

use super::videos::{VideoResponse, parse_video_id};

const VIDEO_FIELD: &str = "video";
const THUMBNAIL_FIELD: &str = "thumbnail";

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(format!("Unable to parse form file: {}", err_msg))
    }
}

fn missing_field(name: &str) -> AppError {
    AppError::BadRequest(format!("Missing form file '{}'", name))
}

fn field_media_type(field: &Field<'_>) -> Result<String, AppError> {
    field
        .content_type()
        .and_then(parse_media_type)
        .ok_or_else(|| AppError::BadRequest("Invalid Content-Type".to_string()))
}

/// Read the rest of the body so the client sees our reply instead of a reset
async fn drain(multipart: &mut Multipart) {
    while let Ok(Some(mut field)) = multipart.next_field().await {
        while let Ok(Some(_)) = field.chunk().await {}
    }
}

#[utoipa::path(
    post,
    path = "/api/video_upload/{video_id}",
    params(
        ("video_id" = String, Path, description = "Video ID")
    ),
    request_body(content = Multipart, description = "MP4 file in the `video` field"),
    responses(
        (status = 200, description = "Video processed and published", body = VideoResponse),
        (status = 400, description = "Invalid id, media type or unreadable video"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Video not found"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Processing or publishing failed")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>, AppError> {
    let result: Result<Json<VideoResponse>, AppError> = async {
        let video_id = parse_video_id(&video_id)?;
        let video = state.videos.get_owned(&video_id, &claims.sub).await?;

        let field = loop {
            match multipart.next_field().await.map_err(multipart_error)? {
                Some(field) if field.name() == Some(VIDEO_FIELD) => break field,
                Some(_) => continue,
                None => return Err(missing_field(VIDEO_FIELD)),
            }
        };
        let media_type = field_media_type(&field)?;
        if media_type != VIDEO_MP4 {
            return Err(AppError::BadRequest(
                "Invalid file type, only MP4 is allowed".to_string(),
            ));
        }
        let extension = video_extension(&media_type).unwrap_or(".mp4");

        info!("🎞️  Uploading video {} for user {}", video_id, claims.sub);

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        let published = state
            .pipeline
            .run(reader, state.config.max_upload_size, &media_type, extension)
            .await?;

        let video = state.videos.set_video_url(video, published.url).await?;
        info!("✅ Video {} published as {}", video.id, published.key);
        Ok(Json(video.into()))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            warn!("Video upload failed early: {}. Consuming remaining stream...", e);
            drain(&mut multipart).await;
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/thumbnail_upload/{video_id}",
    params(
        ("video_id" = String, Path, description = "Video ID")
    ),
    request_body(content = Multipart, description = "JPEG or PNG in the `thumbnail` field"),
    responses(
        (status = 200, description = "Thumbnail published", body = VideoResponse),
        (status = 400, description = "Invalid id or media type"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Video not found"),
        (status = 413, description = "Thumbnail too large")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "videos"
)]
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(video_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VideoResponse>, AppError> {
    let result: Result<Json<VideoResponse>, AppError> = async {
        let video_id = parse_video_id(&video_id)?;
        let video = state.videos.get_owned(&video_id, &claims.sub).await?;

        let field = loop {
            match multipart.next_field().await.map_err(multipart_error)? {
                Some(field) if field.name() == Some(THUMBNAIL_FIELD) => break field,
                Some(_) => continue,
                None => return Err(missing_field(THUMBNAIL_FIELD)),
            }
        };
        let media_type = field_media_type(&field)?;
        let extension = thumbnail_extension(&media_type).ok_or_else(|| {
            AppError::BadRequest("Invalid file type, only JPEG or PNG allowed".to_string())
        })?;

        let reader = StreamReader::new(field.map_err(std::io::Error::other));
        let published = state
            .thumbnails
            .publish(reader, state.config.max_thumbnail_size, &media_type, extension)
            .await?;

        let video = state
            .videos
            .set_thumbnail_url(video, published.url)
            .await?;
        info!("🖼️  Thumbnail for {} published as {}", video.id, published.key);
        Ok(Json(video.into()))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            warn!("Thumbnail upload failed early: {}. Consuming remaining stream...", e);
            drain(&mut multipart).await;
            Err(e)
        }
    }
}
