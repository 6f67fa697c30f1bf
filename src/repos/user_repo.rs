/*
 * Responsibility
 * - users テーブル向け lookup-by-email
 * - PgPool 版と in-memory 版を UserDirectory trait の裏に隠す
 * - DB エラーは RepoError で返す
 */
use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::RepoError;

pub const HEADQUARTERS_USER_TYPE: &str = "HEADQUARTERS";

#[derive(Clone, FromRow)]
pub struct UserRecord {
    #[sqlx(rename = "userId")]
    pub id: Uuid,
    pub email: String,
    #[sqlx(rename = "userType")]
    pub user_type: String,
    // OAuth2-only users have no local password.
    #[sqlx(rename = "passwordHash")]
    pub password_hash: Option<String>,
}

impl UserRecord {
    pub fn is_headquarters(&self) -> bool {
        self.user_type.eq_ignore_ascii_case(HEADQUARTERS_USER_TYPE)
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print the password hash
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("user_type", &self.user_type)
            .finish()
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;
}

#[derive(Clone, Debug)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT "userId", "email", "userType", "passwordHash"
            FROM users
            WHERE lower("email") = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }
}

/// Process-local directory. Keys are lower-cased emails.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, UserRecord>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.email.to_ascii_lowercase(), user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .get(&email.to_ascii_lowercase())
            .map(|u| u.value().clone()))
    }
}
