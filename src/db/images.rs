use sqlx::SqlitePool;
use std::sync::Arc;

use super::RepositoryResult;
use crate::models::image::Image;

#[derive(Clone)]
pub struct ImageRepository {
    db: Arc<SqlitePool>,
}

impl ImageRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> RepositoryResult<Vec<Image>> {
        Ok(sqlx::query_as::<_, Image>(
            "SELECT id, slug, key, post_id, created_at, updated_at
             FROM images ORDER BY created_at DESC",
        )
        .fetch_all(&*self.db)
        .await?)
    }
}
