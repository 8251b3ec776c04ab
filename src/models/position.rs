use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub id: i64,
    pub election_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

const POSITION_COLUMNS: &str = "id, election_id, name, created_at";

impl Position {
    pub async fn insert<'e, E>(
        executor: E,
        election_id: i64,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Position>(&format!(
            r#"
            INSERT INTO positions (election_id, name, created_at)
            VALUES (?, ?, ?)
            RETURNING {POSITION_COLUMNS}
            "#
        ))
        .bind(election_id)
        .bind(name)
        .bind(created_at)
        .fetch_one(executor)
        .await
    }

    /// Looks a position up only within the given election.
    pub async fn find_in_election<'e, E>(
        executor: E,
        election_id: i64,
        position_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Position>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions WHERE id = ? AND election_id = ?"
        ))
        .bind(position_id)
        .bind(election_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_by_election<'e, E>(
        executor: E,
        election_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Position>(&format!(
            "SELECT {POSITION_COLUMNS} FROM positions WHERE election_id = ? ORDER BY created_at, id"
        ))
        .bind(election_id)
        .fetch_all(executor)
        .await
    }

    pub async fn rename<'e, E>(executor: E, id: i64, name: &str) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Position>(&format!(
            "UPDATE positions SET name = ? WHERE id = ? RETURNING {POSITION_COLUMNS}"
        ))
        .bind(name)
        .bind(id)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM positions WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
