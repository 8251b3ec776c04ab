use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: i64,
    pub position_id: i64,
    pub user_id: i64,
    pub fullname: String,
    pub nickname: Option<String>,
    pub picture_id: Option<String>,
    pub vote_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Candidate as shown to voters and creators. `vote_count` is only filled in
/// on the results view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CandidateView {
    pub id: i64,
    pub position_id: i64,
    pub user_id: i64,
    pub fullname: String,
    pub nickname: Option<String>,
    pub picture_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<i64>,
}

impl Candidate {
    /// Fallback avatar used while no picture has been uploaded.
    pub fn default_avatar_url(&self) -> String {
        format!(
            "https://ui-avatars.com/api/?name={}&background=random",
            urlencoding::encode(&self.fullname)
        )
    }

    pub fn into_view(self, picture_url: String, with_votes: bool) -> CandidateView {
        CandidateView {
            id: self.id,
            position_id: self.position_id,
            user_id: self.user_id,
            vote_count: with_votes.then_some(self.vote_count),
            fullname: self.fullname,
            nickname: self.nickname,
            picture_url,
        }
    }
}

const CANDIDATE_COLUMNS: &str =
    "c.id, c.position_id, c.user_id, c.fullname, c.nickname, c.picture_id, c.vote_count, c.created_at";

impl Candidate {
    pub async fn insert<'e, E>(
        executor: E,
        position_id: i64,
        user_id: i64,
        fullname: &str,
        nickname: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Candidate>(
            r#"
            INSERT INTO candidates (position_id, user_id, fullname, nickname, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, position_id, user_id, fullname, nickname, picture_id, vote_count, created_at
            "#,
        )
        .bind(position_id)
        .bind(user_id)
        .bind(fullname)
        .bind(nickname)
        .bind(created_at)
        .fetch_one(executor)
        .await
    }

    /// Finds a candidate only if it stands for a position of `election_id`.
    pub async fn find_in_election<'e, E>(
        executor: E,
        election_id: i64,
        candidate_id: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Candidate>(&format!(
            r#"
            SELECT {CANDIDATE_COLUMNS}
            FROM candidates c
            JOIN positions p ON p.id = c.position_id
            WHERE c.id = ? AND p.election_id = ?
            "#
        ))
        .bind(candidate_id)
        .bind(election_id)
        .fetch_optional(executor)
        .await
    }

    /// All candidates of an election, grouped by position and ranked by
    /// descending vote count within each position.
    pub async fn list_by_election<'e, E>(
        executor: E,
        election_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Candidate>(&format!(
            r#"
            SELECT {CANDIDATE_COLUMNS}
            FROM candidates c
            JOIN positions p ON p.id = c.position_id
            WHERE p.election_id = ?
            ORDER BY c.position_id, c.vote_count DESC, c.id
            "#
        ))
        .bind(election_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update_details<'e, E>(
        executor: E,
        id: i64,
        fullname: &str,
        nickname: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Candidate>(
            r#"
            UPDATE candidates SET fullname = ?, nickname = ?
            WHERE id = ?
            RETURNING id, position_id, user_id, fullname, nickname, picture_id, vote_count, created_at
            "#,
        )
        .bind(fullname)
        .bind(nickname)
        .bind(id)
        .fetch_one(executor)
        .await
    }

    pub async fn set_picture<'e, E>(
        executor: E,
        id: i64,
        picture_id: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Candidate>(
            r#"
            UPDATE candidates SET picture_id = ?
            WHERE id = ?
            RETURNING id, position_id, user_id, fullname, nickname, picture_id, vote_count, created_at
            "#,
        )
        .bind(picture_id)
        .bind(id)
        .fetch_one(executor)
        .await
    }

    pub async fn increment_vote_count<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE candidates SET vote_count = vote_count + 1 WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete<'e, E>(executor: E, id: i64) -> Result<bool, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM candidates WHERE id = ?")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of positions in the election for which the user still stands.
    pub async fn count_for_user_in_election<'e, E>(
        executor: E,
        election_id: i64,
        user_id: i64,
    ) -> Result<i64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM candidates c
            JOIN positions p ON p.id = c.position_id
            WHERE p.election_id = ? AND c.user_id = ?
            "#,
        )
        .bind(election_id)
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Picture ids of every candidate in an election, used to clean up stored
    /// images when the election is removed.
    pub async fn picture_ids_in_election<'e, E>(
        executor: E,
        election_id: i64,
    ) -> Result<Vec<String>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT c.picture_id
            FROM candidates c
            JOIN positions p ON p.id = c.position_id
            WHERE p.election_id = ? AND c.picture_id IS NOT NULL
            "#,
        )
        .bind(election_id)
        .fetch_all(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate_named(fullname: &str) -> Candidate {
        Candidate {
            id: 1,
            position_id: 1,
            user_id: 1,
            fullname: fullname.to_string(),
            nickname: None,
            picture_id: None,
            vote_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_default_avatar_url_encodes_spaces() {
        assert_eq!(
            candidate_named("Ada Lovelace").default_avatar_url(),
            "https://ui-avatars.com/api/?name=Ada%20Lovelace&background=random"
        );
    }

    #[test]
    fn test_default_avatar_url_escapes_query_characters() {
        assert_eq!(
            candidate_named("Ada & Bob #1?").default_avatar_url(),
            "https://ui-avatars.com/api/?name=Ada%20%26%20Bob%20%231%3F&background=random"
        );
        assert_eq!(
            candidate_named("Chloé").default_avatar_url(),
            "https://ui-avatars.com/api/?name=Chlo%C3%A9&background=random"
        );
    }
}
