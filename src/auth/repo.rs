use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{User, VerificationCode};
use crate::error::StoreError;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Inserts a user, failing with `StoreError::DuplicateEmail` if the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;
}

#[async_trait]
pub trait VerificationStore: Send + Sync {
    async fn insert(
        &self,
        email: &str,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Uuid, StoreError>;
    async fn find_latest_by_email(
        &self,
        email: &str,
    ) -> Result<Option<VerificationCode>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    /// Find a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password. The unique index on `email`
    /// turns a concurrent duplicate into `StoreError::DuplicateEmail`.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}

#[derive(Clone)]
pub struct PgVerificationStore {
    db: PgPool,
}

impl PgVerificationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VerificationStore for PgVerificationStore {
    async fn insert(
        &self,
        email: &str,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Uuid, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO verification_codes (email, code, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(code)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(id)
    }

    async fn find_latest_by_email(
        &self,
        email: &str,
    ) -> Result<Option<VerificationCode>, StoreError> {
        let record = sqlx::query_as::<_, VerificationCode>(
            r#"
            SELECT id, email, code, created_at, expires_at
            FROM verification_codes
            WHERE email = $1
            ORDER BY created_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(record)
    }
}
