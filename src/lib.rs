pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::media_tools::MediaToolRunner;
use crate::services::pipeline::VideoPipeline;
use crate::services::thumbnail_service::ThumbnailService;
use crate::services::video_service::VideoService;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: u64 = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::videos::create_video,
        api::handlers::videos::list_videos,
        api::handlers::videos::get_video,
        api::handlers::upload::upload_video,
        api::handlers::upload::upload_thumbnail,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::videos::CreateVideoRequest,
            api::handlers::videos::VideoResponse,
            services::pipeline::PublishResult,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "system", description = "Health and status"),
        (name = "videos", description = "Video records and uploads")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub media_tools: Arc<dyn MediaToolRunner>,
    pub pipeline: Arc<VideoPipeline>,
    pub thumbnails: Arc<ThumbnailService>,
    pub videos: Arc<VideoService>,
    pub config: AppConfig,
}

fn body_limit(size: u64) -> usize {
    usize::try_from(size.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX)
}

pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/videos",
            get(api::handlers::videos::list_videos).post(api::handlers::videos::create_video),
        )
        .route("/videos/:video_id", get(api::handlers::videos::get_video))
        .route(
            "/video_upload/:video_id",
            post(api::handlers::upload::upload_video).layer(
                axum::extract::DefaultBodyLimit::max(body_limit(state.config.max_upload_size)),
            ),
        )
        .route(
            "/thumbnail_upload/:video_id",
            post(api::handlers::upload::upload_thumbnail).layer(
                axum::extract::DefaultBodyLimit::max(body_limit(
                    state.config.max_thumbnail_size,
                )),
            ),
        )
        .layer(from_fn_with_state(
            state.clone(),
            api::middleware::auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
