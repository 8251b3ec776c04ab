use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

/// Whitelist membership: `user_id` may vote in `election_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct AllowedVoter {
    pub user_id: i64,
    pub election_id: i64,
    pub created_at: DateTime<Utc>,
}

impl AllowedVoter {
    /// Inserts the membership. Returns `false` when it already existed.
    pub async fn insert_if_absent<'e, E>(
        executor: E,
        user_id: i64,
        election_id: i64,
        created_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO allowed_voters (user_id, election_id, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id, election_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(election_id)
        .bind(created_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists<'e, E>(executor: E, user_id: i64, election_id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM allowed_voters WHERE user_id = ? AND election_id = ?",
        )
        .bind(user_id)
        .bind(election_id)
        .fetch_one(executor)
        .await?;
        Ok(count > 0)
    }

    pub async fn user_ids_for_election<'e, E>(
        executor: E,
        election_id: i64,
    ) -> Result<Vec<i64>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>("SELECT user_id FROM allowed_voters WHERE election_id = ?")
            .bind(election_id)
            .fetch_all(executor)
            .await
    }

    pub async fn emails_for_election<'e, E>(
        executor: E,
        election_id: i64,
    ) -> Result<Vec<String>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.email
            FROM allowed_voters av
            JOIN users u ON u.id = av.user_id
            WHERE av.election_id = ?
            ORDER BY u.email
            "#,
        )
        .bind(election_id)
        .fetch_all(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, user_id: i64, election_id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM allowed_voters WHERE user_id = ? AND election_id = ?")
            .bind(user_id)
            .bind(election_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
