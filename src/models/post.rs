//! A published post, the owner of images and videos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::video::Video;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,

    /// Unique, URL-safe identifier. Videos and images reference it.
    pub slug: String,

    /// Opaque session identity of the author.
    pub creator_id: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
}

/// A post together with its videos, as returned by the single-post lookup.
#[derive(Serialize, Debug)]
pub struct PostWithMedia {
    #[serde(flatten)]
    pub post: Post,
    pub videos: Vec<Video>,
}

/// One page of posts, newest first.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedPosts {
    pub posts: Vec<Post>,
    pub has_more: bool,
}
