use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryResult, conflict_or};
use crate::models::post::{NewPost, PaginatedPosts, Post};

/// Page size ceiling for `list_page`.
pub const MAX_PAGE_SIZE: usize = 10;

#[derive(Clone)]
pub struct PostRepository {
    db: Arc<SqlitePool>,
}

impl PostRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(&self, creator_id: &str, input: &NewPost) -> RepositoryResult<Post> {
        let now = Utc::now();
        sqlx::query_as::<_, Post>(
            "INSERT INTO posts (id, title, slug, creator_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id, title, slug, creator_id, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.slug)
        .bind(creator_id)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| conflict_or(err, "slug"))
    }

    pub async fn find_by_slug(&self, slug: &str) -> RepositoryResult<Option<Post>> {
        Ok(sqlx::query_as::<_, Post>(
            "SELECT id, title, slug, creator_id, created_at, updated_at
             FROM posts WHERE slug = ?",
        )
        .bind(slug)
        .fetch_optional(&*self.db)
        .await?)
    }

    /// Newest-first page of posts strictly older than `cursor`.
    ///
    /// Fetches one row beyond the page to decide `has_more`.
    pub async fn list_page(
        &self,
        limit: usize,
        cursor: Option<DateTime<Utc>>,
    ) -> RepositoryResult<PaginatedPosts> {
        let page_size = limit.clamp(1, MAX_PAGE_SIZE);
        let fetch_limit = page_size + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, title, slug, creator_id, created_at, updated_at FROM posts",
        );
        if let Some(cursor) = cursor {
            builder.push(" WHERE created_at < ");
            builder.push_bind(cursor);
        }
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut posts: Vec<Post> = builder.build_query_as().fetch_all(&*self.db).await?;
        let has_more = posts.len() == fetch_limit;
        posts.truncate(page_size);

        Ok(PaginatedPosts { posts, has_more })
    }
}
