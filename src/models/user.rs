use crate::services::user_service::normalize_email;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub fullname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// User as exposed over the API (no password hash).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicUser {
    pub user_id: i64,
    pub fullname: String,
    pub email: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            fullname: user.fullname,
            email: user.email,
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, fullname, email, password_hash, email_verified, created_at";

impl User {
    pub async fn insert<'e, E>(
        executor: E,
        fullname: &str,
        email: &str,
        password_hash: &str,
        email_verified: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (fullname, email, password_hash, email_verified, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(fullname)
        .bind(email)
        .bind(password_hash)
        .bind(email_verified)
        .bind(created_at)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// E-mail lookups are case-insensitive; addresses are stored lowercased.
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await
    }

    pub async fn list<'e, E>(executor: E, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn set_password_hash<'e, E>(
        executor: E,
        id: i64,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_verified<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE users SET email_verified = 1 WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes accounts that never verified their e-mail and were created
    /// before `cutoff`. Returns the number of deleted users.
    pub async fn delete_unverified_before<'e, E>(
        executor: E,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM users WHERE email_verified = 0 AND created_at < ?")
            .bind(cutoff)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
