use crate::clock::Clock;
use crate::db::is_unique_violation;
use crate::models::user::User;
use crate::services::user_service::normalize_email;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(
        &self,
        fullname: &str,
        email: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()>;
    async fn verify_email(&self, id: i64) -> RepositoryResult<()>;
    async fn delete_user(&self, id: i64) -> RepositoryResult<()>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(
        &self,
        fullname: &str,
        email: &str,
        password_hash: &str,
        email_verified: bool,
    ) -> RepositoryResult<User> {
        let email = normalize_email(email);
        match User::insert(
            &self.pool,
            fullname,
            &email,
            password_hash,
            email_verified,
            self.clock.now(),
        )
        .await
        {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        if !User::set_password_hash(&self.pool, id, password_hash).await? {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn verify_email(&self, id: i64) -> RepositoryResult<()> {
        if !User::mark_verified(&self.pool, id).await? {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_user(&self, id: i64) -> RepositoryResult<()> {
        if !User::delete(&self.pool, id).await? {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        Ok(User::list(&self.pool, limit, offset).await?)
    }
}
