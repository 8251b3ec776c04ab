use crate::clock::Clock;
use crate::db::is_unique_violation;
use crate::models::{
    AllowedVoter, Candidate, CandidateView, Election, ElectionStatus, Position, Vote,
};
use crate::services::election_service::{load_owned_election, ElectionError};
use crate::services::image_store::{candidate_picture_url, ImageStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct CastVoteRequest {
    pub election_id: i64,
    pub position_id: i64,
    pub candidate_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    Voted,
    #[serde(rename = "not voted")]
    NotVoted,
}

#[derive(Debug, Clone, Serialize)]
pub struct BallotEntry {
    pub election_id: i64,
    pub election_name: String,
    pub creator_id: i64,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub status: ElectionStatus,
    pub vote_status: VoteStatus,
    pub is_creator: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionBallot {
    pub position_id: i64,
    pub position_name: String,
    pub candidates: Vec<CandidateView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElectionDetails {
    pub election_id: i64,
    pub election_name: String,
    pub creator_id: i64,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub status: ElectionStatus,
    pub positions: Vec<PositionBallot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_voters: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionResult {
    pub position_id: i64,
    pub position_name: String,
    pub total_votes: i64,
    pub candidates: Vec<CandidateView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElectionResults {
    pub election_id: i64,
    pub election_name: String,
    pub status: ElectionStatus,
    pub leaderboard: Vec<PositionResult>,
}

pub struct VotingService {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    image_store: Arc<dyn ImageStore>,
}

impl VotingService {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, image_store: Arc<dyn ImageStore>) -> Self {
        Self {
            pool,
            clock,
            image_store,
        }
    }

    /// Records one vote and bumps the candidate's tally, or fails without
    /// side effects. Checks run in a fixed order and stop at the first
    /// failure.
    ///
    /// The transaction takes the write lock up front, so a concurrent vote
    /// for the same position waits and then fails with `AlreadyVoted`.
    pub async fn cast_vote(&self, voter_id: i64, request: CastVoteRequest) -> Result<Vote, ElectionError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;

        let election = Election::find_by_id(&mut *tx, request.election_id)
            .await?
            .ok_or(ElectionError::ElectionNotFound)?;

        match election.status_at(now) {
            ElectionStatus::Upcoming => return Err(ElectionError::ElectionNotStarted),
            ElectionStatus::Ended => return Err(ElectionError::ElectionEnded),
            ElectionStatus::Active => {}
        }

        if !AllowedVoter::exists(&mut *tx, voter_id, election.id).await? {
            return Err(ElectionError::NotWhitelisted);
        }

        let candidate = Candidate::find_in_election(&mut *tx, election.id, request.candidate_id)
            .await?
            .ok_or(ElectionError::InvalidCandidate)?;

        if candidate.position_id != request.position_id {
            return Err(ElectionError::CandidateNotForPosition);
        }

        let vote = Vote::insert(&mut *tx, voter_id, candidate.position_id, candidate.id, now)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ElectionError::AlreadyVoted
                } else {
                    ElectionError::Database(e)
                }
            })?;
        Candidate::increment_vote_count(&mut *tx, candidate.id).await?;
        tx.commit().await?;

        tracing::info!(
            "User {} voted in election {} (position {})",
            voter_id,
            election.id,
            candidate.position_id
        );
        Ok(vote)
    }

    /// Elections the user created or may vote in, with their phase and
    /// whether the user has voted yet.
    pub async fn my_ballot(&self, user_id: i64) -> Result<Vec<BallotEntry>, ElectionError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let elections = Election::list_visible_to(&mut *tx, user_id).await?;
        let voted: HashSet<i64> = Vote::election_ids_voted_by(&mut *tx, user_id)
            .await?
            .into_iter()
            .collect();
        tx.commit().await?;

        Ok(elections
            .into_iter()
            .map(|e| BallotEntry {
                status: e.status_at(now),
                vote_status: if voted.contains(&e.id) {
                    VoteStatus::Voted
                } else {
                    VoteStatus::NotVoted
                },
                is_creator: e.is_created_by(user_id),
                election_id: e.id,
                election_name: e.name,
                creator_id: e.creator_id,
                start_time: e.start_time,
                stop_time: e.stop_time,
            })
            .collect())
    }

    /// The ballot paper of an election. Vote counts are never included.
    pub async fn election_details(
        &self,
        user_id: i64,
        election_id: i64,
    ) -> Result<ElectionDetails, ElectionError> {
        let mut tx = self.pool.begin().await?;
        let election = Election::find_by_id(&mut *tx, election_id)
            .await?
            .ok_or(ElectionError::ElectionNotFound)?;

        if !AllowedVoter::exists(&mut *tx, user_id, election.id).await? {
            return Err(ElectionError::NotWhitelisted);
        }

        let positions = Position::list_by_election(&mut *tx, election.id).await?;
        let candidates = Candidate::list_by_election(&mut *tx, election.id).await?;
        let allowed_voters = if election.is_created_by(user_id) {
            Some(AllowedVoter::emails_for_election(&mut *tx, election.id).await?)
        } else {
            None
        };
        tx.commit().await?;

        let mut candidates = candidates;
        candidates.sort_by_key(|c| (c.position_id, c.id));

        let positions = positions
            .into_iter()
            .map(|p| PositionBallot {
                candidates: candidates
                    .iter()
                    .filter(|c| c.position_id == p.id)
                    .cloned()
                    .map(|c| self.view(c, false))
                    .collect(),
                position_id: p.id,
                position_name: p.name,
            })
            .collect();

        Ok(ElectionDetails {
            status: election.status_at(self.clock.now()),
            election_id: election.id,
            election_name: election.name,
            creator_id: election.creator_id,
            start_time: election.start_time,
            stop_time: election.stop_time,
            positions,
            allowed_voters,
        })
    }

    /// Per-position leaderboard, visible to the creator only.
    pub async fn election_results(
        &self,
        actor_id: i64,
        election_id: i64,
    ) -> Result<ElectionResults, ElectionError> {
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;
        let positions = Position::list_by_election(&mut *tx, election.id).await?;
        // Already ordered by position, then descending vote count, then id.
        let candidates = Candidate::list_by_election(&mut *tx, election.id).await?;
        tx.commit().await?;

        let leaderboard = positions
            .into_iter()
            .map(|p| {
                let ranked: Vec<CandidateView> = candidates
                    .iter()
                    .filter(|c| c.position_id == p.id)
                    .cloned()
                    .map(|c| self.view(c, true))
                    .collect();
                PositionResult {
                    total_votes: ranked.iter().filter_map(|c| c.vote_count).sum(),
                    position_id: p.id,
                    position_name: p.name,
                    candidates: ranked,
                }
            })
            .collect();

        Ok(ElectionResults {
            status: election.status_at(self.clock.now()),
            election_id: election.id,
            election_name: election.name,
            leaderboard,
        })
    }

    fn view(&self, candidate: Candidate, with_votes: bool) -> CandidateView {
        let url = candidate_picture_url(self.image_store.as_ref(), &candidate);
        candidate.into_view(url, with_votes)
    }
}
