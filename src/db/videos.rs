use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryResult, conflict_or};
use crate::models::video::Video;

const VIDEO_COLUMNS: &str = "id, slug, key, description, duration, ready, playback_id, \
     video_id, post_id, created_at, updated_at";

#[derive(Clone)]
pub struct VideoRepository {
    db: Arc<SqlitePool>,
}

impl VideoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(&self, video: &Video) -> RepositoryResult<Video> {
        let sql = format!(
            "INSERT INTO videos ({VIDEO_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {VIDEO_COLUMNS}"
        );
        sqlx::query_as::<_, Video>(&sql)
            .bind(video.id)
            .bind(&video.slug)
            .bind(&video.key)
            .bind(&video.description)
            .bind(video.duration)
            .bind(video.ready)
            .bind(&video.playback_id)
            .bind(&video.video_id)
            .bind(video.post_id)
            .bind(video.created_at)
            .bind(video.updated_at)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| conflict_or(err, "playbackId/videoId"))
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<Video>> {
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?");
        Ok(sqlx::query_as::<_, Video>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?)
    }

    /// Look up a video by the transcode provider's job identifier.
    pub async fn find_by_job_id(&self, video_id: &str) -> RepositoryResult<Option<Video>> {
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE video_id = ?");
        Ok(sqlx::query_as::<_, Video>(&sql)
            .bind(video_id)
            .fetch_optional(&*self.db)
            .await?)
    }

    pub async fn list_by_slug(&self, slug: &str) -> RepositoryResult<Vec<Video>> {
        let sql = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE slug = ? ORDER BY created_at");
        Ok(sqlx::query_as::<_, Video>(&sql)
            .bind(slug)
            .fetch_all(&*self.db)
            .await?)
    }

    /// Set `ready` and `duration` in one write.
    pub async fn mark_ready(
        &self,
        id: Uuid,
        duration: f64,
        at: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let result =
            sqlx::query("UPDATE videos SET ready = 1, duration = ?, updated_at = ? WHERE id = ?")
                .bind(duration)
                .bind(at)
                .bind(id)
                .execute(&*self.db)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns false when no row matched.
    pub async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let result = sqlx::query("DELETE FROM videos WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
pub(crate) fn sample_video(job_id: &str, created_at: DateTime<Utc>) -> Video {
    Video {
        id: Uuid::new_v4(),
        slug: "first-post".into(),
        key: format!("videos/{job_id}.mp4"),
        description: "a test video".into(),
        duration: 0.0,
        ready: false,
        playback_id: format!("playback-{job_id}"),
        video_id: job_id.to_string(),
        post_id: None,
        created_at,
        updated_at: created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{RepositoryError, test_pool};

    #[tokio::test]
    async fn create_find_update_delete() {
        let repo = VideoRepository::new(Arc::new(test_pool().await));
        let video = repo.create(&sample_video("job-1", Utc::now())).await.unwrap();

        let found = repo.find_by_job_id("job-1").await.unwrap().unwrap();
        assert_eq!(found.id, video.id);
        assert!(!found.ready);

        assert!(repo.mark_ready(video.id, 12.5, Utc::now()).await.unwrap());
        let updated = repo.find_by_id(video.id).await.unwrap().unwrap();
        assert!(updated.ready);
        assert_eq!(updated.duration, 12.5);

        assert_eq!(repo.list_by_slug("first-post").await.unwrap().len(), 1);
        assert!(repo.delete(video.id).await.unwrap());
        assert!(!repo.delete(video.id).await.unwrap());
        assert!(repo.find_by_id(video.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn job_ids_are_unique() {
        let repo = VideoRepository::new(Arc::new(test_pool().await));
        repo.create(&sample_video("job-1", Utc::now())).await.unwrap();

        let mut dup = sample_video("job-1", Utc::now());
        dup.playback_id = "other".into();
        let err = repo.create(&dup).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
