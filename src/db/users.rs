use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use super::{RepositoryResult, conflict_or};
use crate::models::user::{LoginType, User};

#[derive(Clone)]
pub struct UserRepository {
    db: Arc<SqlitePool>,
}

impl UserRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: &str,
        login_type: LoginType,
        username: &str,
        email: &str,
    ) -> RepositoryResult<User> {
        let now = Utc::now();
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, user_id, login_type, username, email, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id, user_id, login_type, username, email, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(login_type)
        .bind(username)
        .bind(email)
        .bind(now)
        .bind(now)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| conflict_or(err, "user"))
    }

    pub async fn find_by_id(&self, id: Uuid) -> RepositoryResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, user_id, login_type, username, email, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?)
    }

    pub async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        self.find_one("username", username).await
    }

    pub async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        self.find_one("email", email).await
    }

    /// `column` is always one of the unique columns named above, never user input.
    async fn find_one(&self, column: &'static str, value: &str) -> RepositoryResult<Option<User>> {
        let sql = format!(
            "SELECT id, user_id, login_type, username, email, created_at, updated_at
             FROM users WHERE {column} = ?"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&*self.db)
            .await?)
    }
}
