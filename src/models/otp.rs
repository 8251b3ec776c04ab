use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum OtpType {
    Signup,
    ForgotPassword,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Otp {
    pub id: i64,
    pub user_id: i64,
    pub otp_type: OtpType,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Otp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub async fn insert<'e, E>(
        executor: E,
        user_id: i64,
        otp_type: OtpType,
        code: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Otp>(
            r#"
            INSERT INTO otps (user_id, otp_type, code, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, user_id, otp_type, code, created_at, expires_at
            "#,
        )
        .bind(user_id)
        .bind(otp_type)
        .bind(code)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(executor)
        .await
    }

    /// Most recently issued code of the given type for the user.
    pub async fn latest_for_user<'e, E>(
        executor: E,
        user_id: i64,
        otp_type: OtpType,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Otp>(
            r#"
            SELECT id, user_id, otp_type, code, created_at, expires_at
            FROM otps
            WHERE user_id = ? AND otp_type = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(otp_type)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM otps WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_expired<'e, E>(executor: E, now: DateTime<Utc>) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM otps WHERE expires_at < ?")
            .bind(now)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
