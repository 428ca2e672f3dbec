//! Core data models for the post/video media backend.
//!
//! Persistent entities map to SQLite tables via `sqlx::FromRow` and serialize
//! as JSON via `serde`. `storage` holds the ephemeral types that only live for
//! the duration of one storage operation.

pub mod image;
pub mod post;
pub mod storage;
pub mod user;
pub mod video;
