use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Election {
    pub id: i64,
    pub creator_id: i64,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle phase of an election relative to a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    Upcoming,
    Active,
    Ended,
}

impl Election {
    /// Voting is open on the closed interval `[start_time, stop_time]`.
    pub fn status_at(&self, now: DateTime<Utc>) -> ElectionStatus {
        if now < self.start_time {
            ElectionStatus::Upcoming
        } else if now > self.stop_time {
            ElectionStatus::Ended
        } else {
            ElectionStatus::Active
        }
    }

    /// Positions, candidates and the start time are frozen once the election
    /// has begun.
    pub fn is_structurally_locked(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }

    pub fn is_created_by(&self, user_id: i64) -> bool {
        self.creator_id == user_id
    }
}

const ELECTION_COLUMNS: &str = "id, creator_id, name, start_time, stop_time, created_at";

impl Election {
    pub async fn insert<'e, E>(
        executor: E,
        creator_id: i64,
        name: &str,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Election>(&format!(
            r#"
            INSERT INTO elections (creator_id, name, start_time, stop_time, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {ELECTION_COLUMNS}
            "#
        ))
        .bind(creator_id)
        .bind(name)
        .bind(start_time)
        .bind(stop_time)
        .bind(created_at)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Election>(&format!(
            "SELECT {ELECTION_COLUMNS} FROM elections WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn update<'e, E>(
        executor: E,
        id: i64,
        name: &str,
        start_time: DateTime<Utc>,
        stop_time: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Election>(&format!(
            r#"
            UPDATE elections
            SET name = ?, start_time = ?, stop_time = ?
            WHERE id = ?
            RETURNING {ELECTION_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(start_time)
        .bind(stop_time)
        .bind(id)
        .fetch_one(executor)
        .await
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM elections WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Elections the user created or is whitelisted for, without duplicates.
    pub async fn list_visible_to<'e, E>(executor: E, user_id: i64) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Election>(
            r#"
            SELECT id, creator_id, name, start_time, stop_time, created_at
            FROM elections
            WHERE creator_id = ?
            UNION
            SELECT e.id, e.creator_id, e.name, e.start_time, e.stop_time, e.created_at
            FROM elections e
            JOIN allowed_voters av ON av.election_id = e.id
            WHERE av.user_id = ?
            ORDER BY start_time, id
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(executor)
        .await
    }
}
