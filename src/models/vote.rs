use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

/// A recorded vote. `(user_id, position_id)` is the primary key, so a voter
/// can hold at most one vote per position.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub user_id: i64,
    pub position_id: i64,
    pub candidate_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    /// Appends a vote. A second vote for the same position fails with a
    /// unique-constraint violation.
    pub async fn insert<'e, E>(
        executor: E,
        user_id: i64,
        position_id: i64,
        candidate_id: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (user_id, position_id, candidate_id, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING user_id, position_id, candidate_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(position_id)
        .bind(candidate_id)
        .bind(created_at)
        .fetch_one(executor)
        .await
    }

    pub async fn count_for_position<'e, E>(executor: E, position_id: i64) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM votes WHERE position_id = ?")
            .bind(position_id)
            .fetch_one(executor)
            .await
    }

    /// Ids of the elections in which the user has voted for at least one
    /// position.
    pub async fn election_ids_voted_by<'e, E>(executor: E, user_id: i64) -> Result<Vec<i64>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT p.election_id
            FROM votes v
            JOIN positions p ON p.id = v.position_id
            WHERE v.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }
}
