use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::api::error::AppError;
use crate::entities::{prelude::*, videos};

/// Video records and their ownership rules
#[derive(Clone)]
pub struct VideoService {
    db: DatabaseConnection,
}

impl VideoService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: &str,
        title: String,
        description: Option<String>,
    ) -> Result<videos::Model, AppError> {
        let now = Utc::now();
        let video = videos::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            user_id: Set(user_id.to_string()),
            title: Set(title),
            description: Set(description),
            thumbnail_url: Set(None),
            video_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(video.insert(&self.db).await?)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<videos::Model>, AppError> {
        Ok(Videos::find()
            .filter(videos::Column::UserId.eq(user_id))
            .order_by_desc(videos::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Fetch a video the caller owns. Missing is 404, someone else's is 401.
    pub async fn get_owned(&self, video_id: &str, user_id: &str) -> Result<videos::Model, AppError> {
        let video = Videos::find_by_id(video_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Couldn't find video".to_string()))?;

        if video.user_id != user_id {
            return Err(AppError::Unauthorized(
                "Not authorized to update this video".to_string(),
            ));
        }

        Ok(video)
    }

    pub async fn set_video_url(
        &self,
        video: videos::Model,
        url: String,
    ) -> Result<videos::Model, AppError> {
        let mut active: videos::ActiveModel = video.into();
        active.video_url = Set(Some(url));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    pub async fn set_thumbnail_url(
        &self,
        video: videos::Model,
        url: String,
    ) -> Result<videos::Model, AppError> {
        let mut active: videos::ActiveModel = video.into();
        active.thumbnail_url = Set(Some(url));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::run_migrations;
    use sea_orm::Database;

    async fn setup() -> VideoService {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();
        VideoService::new(db)
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let service = setup().await;
        service
            .create("alice", "Boots".to_string(), None)
            .await
            .unwrap();
        service
            .create("bob", "Not alice's".to_string(), Some("desc".to_string()))
            .await
            .unwrap();

        let videos = service.list_for_user("alice").await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].title, "Boots");
        assert!(videos[0].video_url.is_none());
    }

    #[tokio::test]
    async fn test_ownership_checks() {
        let service = setup().await;
        let video = service
            .create("alice", "Boots".to_string(), None)
            .await
            .unwrap();

        assert!(service.get_owned(&video.id, "alice").await.is_ok());
        assert!(matches!(
            service.get_owned(&video.id, "mallory").await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            service.get_owned("missing", "alice").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_video_url() {
        let service = setup().await;
        let video = service
            .create("alice", "Boots".to_string(), None)
            .await
            .unwrap();

        let updated = service
            .set_video_url(video, "https://cdn.test/landscape/abc.mp4".to_string())
            .await
            .unwrap();
        assert_eq!(
            updated.video_url.as_deref(),
            Some("https://cdn.test/landscape/abc.mp4")
        );

        let fetched = service.get_owned(&updated.id, "alice").await.unwrap();
        assert_eq!(fetched.video_url, updated.video_url);
    }
}
