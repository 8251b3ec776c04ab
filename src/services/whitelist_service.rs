use crate::clock::Clock;
use crate::models::{AllowedVoter, Candidate, Election, User};
use crate::services::election_service::{load_owned_election, ElectionError};
use crate::services::user_service::normalize_email;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of a bulk whitelist addition. The three e-mail lists are disjoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WhitelistReport {
    pub added_count: usize,
    pub added: Vec<String>,
    pub already_enrolled: Vec<String>,
    pub not_registered: Vec<String>,
}

/// Whitelists the creator of a freshly created election.
pub async fn enroll_creator(
    conn: &mut SqliteConnection,
    election: &Election,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    AllowedVoter::insert_if_absent(&mut *conn, election.creator_id, election.id, now).await?;
    Ok(())
}

/// Whitelists a user who has just been added as a candidate.
pub async fn enroll_candidate(
    conn: &mut SqliteConnection,
    election_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    AllowedVoter::insert_if_absent(&mut *conn, user_id, election_id, now).await?;
    Ok(())
}

/// Drops the whitelist entry of a former candidate, unless they created the
/// election or still stand for another position in it.
pub async fn release_candidate_enrollment(
    conn: &mut SqliteConnection,
    election: &Election,
    user_id: i64,
) -> Result<(), sqlx::Error> {
    if election.is_created_by(user_id) {
        return Ok(());
    }

    let still_standing = Candidate::count_for_user_in_election(&mut *conn, election.id, user_id).await?;
    if still_standing == 0 {
        AllowedVoter::delete(&mut *conn, user_id, election.id).await?;
    }
    Ok(())
}

/// Trims, lowercases and de-duplicates e-mails, keeping first appearance order.
fn normalize_emails(emails: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    emails
        .iter()
        .map(|e| normalize_email(e))
        .filter(|e| !e.is_empty())
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

pub struct WhitelistService {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl WhitelistService {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn add_allowed_voters(
        &self,
        actor_id: i64,
        election_id: i64,
        emails: &[String],
    ) -> Result<WhitelistReport, ElectionError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;

        let enrolled: HashSet<i64> = AllowedVoter::user_ids_for_election(&mut *tx, election.id)
            .await?
            .into_iter()
            .collect();

        let mut report = WhitelistReport {
            added_count: 0,
            added: Vec::new(),
            already_enrolled: Vec::new(),
            not_registered: Vec::new(),
        };

        for email in normalize_emails(emails) {
            match User::find_by_email(&mut *tx, &email).await? {
                None => report.not_registered.push(email),
                Some(user) if enrolled.contains(&user.id) => report.already_enrolled.push(email),
                Some(user) => {
                    if AllowedVoter::insert_if_absent(&mut *tx, user.id, election.id, now).await? {
                        report.added.push(email);
                    } else {
                        report.already_enrolled.push(email);
                    }
                }
            }
        }
        tx.commit().await?;

        report.added_count = report.added.len();
        tracing::info!(
            "Whitelist for election {}: {} added, {} already enrolled, {} not registered",
            election_id,
            report.added_count,
            report.already_enrolled.len(),
            report.not_registered.len()
        );
        Ok(report)
    }

    pub async fn remove_allowed_voter(
        &self,
        actor_id: i64,
        election_id: i64,
        email: &str,
    ) -> Result<(), ElectionError> {
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;

        let user = User::find_by_email(&mut *tx, email)
            .await?
            .ok_or(ElectionError::UserNotFound)?;
        if election.is_created_by(user.id) {
            return Err(ElectionError::Validation(
                "The election creator cannot be removed from the whitelist".to_string(),
            ));
        }

        if !AllowedVoter::delete(&mut *tx, user.id, election.id).await? {
            return Err(ElectionError::NotOnWhitelist);
        }
        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_emails_dedups_in_order() {
        let input = vec![
            " B@example.com".to_string(),
            "a@example.com".to_string(),
            "b@EXAMPLE.com ".to_string(),
            "   ".to_string(),
        ];

        assert_eq!(
            normalize_emails(&input),
            vec!["b@example.com".to_string(), "a@example.com".to_string()]
        );
    }
}
