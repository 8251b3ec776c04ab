use crate::clock::Clock;
use crate::db::is_unique_violation;
use crate::models::{Candidate, CandidateView, Election, Position, User};
use crate::services::image_store::{candidate_picture_url, ImageStore, ImageStoreError};
use crate::services::whitelist_service::{
    enroll_candidate, enroll_creator, release_candidate_enrollment,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

/// Errors shared by the election, whitelist and voting services.
#[derive(Debug, thiserror::Error)]
pub enum ElectionError {
    #[error("Election not found")]
    ElectionNotFound,
    #[error("Position not found")]
    PositionNotFound,
    #[error("Candidate not found")]
    CandidateNotFound,
    #[error("User does not exist")]
    UserNotFound,
    #[error("You are not authorized to make changes to this election")]
    NotCreator,
    #[error("The election has already started; its structure can no longer be changed")]
    StructuralLock,
    #[error("{0}")]
    InvalidTimeWindow(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("An election with this name already exists")]
    DuplicateElectionName,
    #[error("A position with this name already exists in this election")]
    DuplicatePositionName,
    #[error("User is already a candidate for this position")]
    DuplicateCandidate,
    #[error("The election has not started")]
    ElectionNotStarted,
    #[error("The election has ended")]
    ElectionEnded,
    #[error("You are not authorized to vote in this election")]
    NotWhitelisted,
    #[error("Invalid candidate selection for this election")]
    InvalidCandidate,
    #[error("Candidate does not stand for this position")]
    CandidateNotForPosition,
    #[error("You have already voted for this position")]
    AlreadyVoted,
    #[error("User is not on the whitelist for this election")]
    NotOnWhitelist,
    #[error(transparent)]
    Image(#[from] ImageStoreError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Deserialize)]
pub struct NewElection {
    #[serde(alias = "election_name")]
    pub name: String,
    #[serde(alias = "startTime")]
    pub start_time: DateTime<Utc>,
    #[serde(alias = "stopTime")]
    pub stop_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ElectionUpdate {
    pub election_id: i64,
    #[serde(default, alias = "election_name")]
    pub name: Option<String>,
    #[serde(default, alias = "startTime")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "stopTime")]
    pub stop_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct NewCandidate {
    pub election_id: i64,
    pub position_id: i64,
    pub email: String,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateUpdate {
    pub election_id: i64,
    pub candidate_id: i64,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// Loads an election and checks that `actor_id` created it.
pub(crate) async fn load_owned_election(
    conn: &mut SqliteConnection,
    election_id: i64,
    actor_id: i64,
) -> Result<Election, ElectionError> {
    let election = Election::find_by_id(&mut *conn, election_id)
        .await?
        .ok_or(ElectionError::ElectionNotFound)?;

    if !election.is_created_by(actor_id) {
        return Err(ElectionError::NotCreator);
    }

    Ok(election)
}

fn ensure_unlocked(election: &Election, now: DateTime<Utc>) -> Result<(), ElectionError> {
    if election.is_structurally_locked(now) {
        return Err(ElectionError::StructuralLock);
    }
    Ok(())
}

fn required_name(value: &str, field: &str) -> Result<String, ElectionError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ElectionError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn on_unique(err: sqlx::Error, duplicate: ElectionError) -> ElectionError {
    if is_unique_violation(&err) {
        duplicate
    } else {
        ElectionError::Database(err)
    }
}

pub struct ElectionService {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    image_store: Arc<dyn ImageStore>,
}

impl ElectionService {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>, image_store: Arc<dyn ImageStore>) -> Self {
        Self {
            pool,
            clock,
            image_store,
        }
    }

    pub async fn create_election(
        &self,
        actor_id: i64,
        input: NewElection,
    ) -> Result<Election, ElectionError> {
        let name = required_name(&input.name, "election name")?;
        if input.start_time >= input.stop_time {
            return Err(ElectionError::InvalidTimeWindow(
                "stop_time must be greater than start_time",
            ));
        }

        let mut tx = self.pool.begin().await?;
        let election = Election::insert(
            &mut *tx,
            actor_id,
            &name,
            input.start_time,
            input.stop_time,
            self.clock.now(),
        )
        .await
        .map_err(|e| on_unique(e, ElectionError::DuplicateElectionName))?;
        enroll_creator(&mut tx, &election, self.clock.now()).await?;
        tx.commit().await?;

        tracing::info!("User {} created election {}", actor_id, election.id);
        Ok(election)
    }

    /// Applies a partial update. Once the election has started only the name
    /// and a future stop time may change.
    pub async fn update_election(
        &self,
        actor_id: i64,
        input: ElectionUpdate,
    ) -> Result<Election, ElectionError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, input.election_id, actor_id).await?;
        let locked = election.is_structurally_locked(now);

        let start_time = input.start_time.unwrap_or(election.start_time);
        let stop_time = input.stop_time.unwrap_or(election.stop_time);
        let name = match input.name.as_deref() {
            Some(name) => required_name(name, "election name")?,
            None => election.name.clone(),
        };

        if locked && start_time != election.start_time {
            return Err(ElectionError::StructuralLock);
        }
        if start_time >= stop_time {
            return Err(ElectionError::InvalidTimeWindow(
                "stop_time must be greater than start_time",
            ));
        }
        if locked && stop_time != election.stop_time && stop_time <= now {
            return Err(ElectionError::InvalidTimeWindow(
                "stop_time must be in the future once the election has started",
            ));
        }

        let updated = Election::update(&mut *tx, election.id, &name, start_time, stop_time)
            .await
            .map_err(|e| on_unique(e, ElectionError::DuplicateElectionName))?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Deletes the election with everything under it. Allowed at any time.
    pub async fn delete_election(&self, actor_id: i64, election_id: i64) -> Result<(), ElectionError> {
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;
        let pictures = Candidate::picture_ids_in_election(&mut *tx, election.id).await?;
        Election::delete(&mut *tx, election.id).await?;
        tx.commit().await?;

        self.discard_pictures(&pictures).await;
        tracing::info!("User {} deleted election {}", actor_id, election_id);
        Ok(())
    }

    pub async fn add_position(
        &self,
        actor_id: i64,
        election_id: i64,
        name: &str,
    ) -> Result<Position, ElectionError> {
        let name = required_name(name, "position name")?;
        let now = self.clock.now();

        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;
        ensure_unlocked(&election, now)?;

        let position = Position::insert(&mut *tx, election.id, &name, now)
            .await
            .map_err(|e| on_unique(e, ElectionError::DuplicatePositionName))?;
        tx.commit().await?;

        Ok(position)
    }

    pub async fn rename_position(
        &self,
        actor_id: i64,
        election_id: i64,
        position_id: i64,
        name: &str,
    ) -> Result<Position, ElectionError> {
        let name = required_name(name, "position name")?;

        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;
        ensure_unlocked(&election, self.clock.now())?;

        let position = Position::find_in_election(&mut *tx, election.id, position_id)
            .await?
            .ok_or(ElectionError::PositionNotFound)?;
        let renamed = Position::rename(&mut *tx, position.id, &name)
            .await
            .map_err(|e| on_unique(e, ElectionError::DuplicatePositionName))?;
        tx.commit().await?;

        Ok(renamed)
    }

    /// Deletes a position with its candidates, releasing the whitelist
    /// entries that only existed because of those candidacies.
    pub async fn delete_position(
        &self,
        actor_id: i64,
        election_id: i64,
        position_id: i64,
    ) -> Result<(), ElectionError> {
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;
        ensure_unlocked(&election, self.clock.now())?;

        let position = Position::find_in_election(&mut *tx, election.id, position_id)
            .await?
            .ok_or(ElectionError::PositionNotFound)?;
        let candidates: Vec<Candidate> = Candidate::list_by_election(&mut *tx, election.id)
            .await?
            .into_iter()
            .filter(|c| c.position_id == position.id)
            .collect();

        Position::delete(&mut *tx, position.id).await?;
        for candidate in &candidates {
            release_candidate_enrollment(&mut tx, &election, candidate.user_id).await?;
        }
        tx.commit().await?;

        let pictures: Vec<String> = candidates.into_iter().filter_map(|c| c.picture_id).collect();
        self.discard_pictures(&pictures).await;
        Ok(())
    }

    /// Adds a registered user as candidate and whitelists them.
    pub async fn add_candidate(
        &self,
        actor_id: i64,
        input: NewCandidate,
    ) -> Result<CandidateView, ElectionError> {
        let now = self.clock.now();

        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, input.election_id, actor_id).await?;
        ensure_unlocked(&election, now)?;

        let position = Position::find_in_election(&mut *tx, election.id, input.position_id)
            .await?
            .ok_or(ElectionError::PositionNotFound)?;
        let user = User::find_by_email(&mut *tx, &input.email)
            .await?
            .ok_or(ElectionError::UserNotFound)?;

        let fullname = match input.fullname.as_deref() {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => user.fullname.clone(),
        };
        let nickname = input
            .nickname
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let candidate = Candidate::insert(&mut *tx, position.id, user.id, &fullname, nickname, now)
            .await
            .map_err(|e| on_unique(e, ElectionError::DuplicateCandidate))?;
        enroll_candidate(&mut tx, election.id, user.id, now).await?;
        tx.commit().await?;

        Ok(self.view(candidate))
    }

    pub async fn update_candidate(
        &self,
        actor_id: i64,
        input: CandidateUpdate,
    ) -> Result<CandidateView, ElectionError> {
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, input.election_id, actor_id).await?;
        ensure_unlocked(&election, self.clock.now())?;

        let candidate = Candidate::find_in_election(&mut *tx, election.id, input.candidate_id)
            .await?
            .ok_or(ElectionError::CandidateNotFound)?;

        let fullname = match input.fullname.as_deref() {
            Some(name) => required_name(name, "fullname")?,
            None => candidate.fullname.clone(),
        };
        let nickname = match input.nickname.as_deref().map(str::trim) {
            Some("") => None,
            Some(nickname) => Some(nickname.to_string()),
            None => candidate.nickname.clone(),
        };

        let updated =
            Candidate::update_details(&mut *tx, candidate.id, &fullname, nickname.as_deref())
                .await?;
        tx.commit().await?;

        Ok(self.view(updated))
    }

    pub async fn delete_candidate(
        &self,
        actor_id: i64,
        election_id: i64,
        candidate_id: i64,
    ) -> Result<(), ElectionError> {
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;
        ensure_unlocked(&election, self.clock.now())?;

        let candidate = Candidate::find_in_election(&mut *tx, election.id, candidate_id)
            .await?
            .ok_or(ElectionError::CandidateNotFound)?;
        Candidate::delete(&mut *tx, candidate.id).await?;
        release_candidate_enrollment(&mut tx, &election, candidate.user_id).await?;
        tx.commit().await?;

        if let Some(picture_id) = candidate.picture_id {
            self.discard_pictures(&[picture_id]).await;
        }
        Ok(())
    }

    /// Stores a new picture for a candidate, replacing any previous one.
    pub async fn set_candidate_picture(
        &self,
        actor_id: i64,
        election_id: i64,
        candidate_id: i64,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<CandidateView, ElectionError> {
        let mut tx = self.pool.begin().await?;
        let election = load_owned_election(&mut tx, election_id, actor_id).await?;
        ensure_unlocked(&election, self.clock.now())?;

        let candidate = Candidate::find_in_election(&mut *tx, election.id, candidate_id)
            .await?
            .ok_or(ElectionError::CandidateNotFound)?;

        let picture_id = self.image_store.store(bytes, content_type).await?;
        let saved = async {
            let updated = Candidate::set_picture(&mut *tx, candidate.id, Some(&picture_id)).await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(updated)
        }
        .await;

        let updated = match saved {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_pictures(&[picture_id]).await;
                return Err(e.into());
            }
        };

        if let Some(previous) = candidate.picture_id {
            self.discard_pictures(&[previous]).await;
        }
        Ok(self.view(updated))
    }

    fn view(&self, candidate: Candidate) -> CandidateView {
        let url = candidate_picture_url(self.image_store.as_ref(), &candidate);
        candidate.into_view(url, false)
    }

    async fn discard_pictures(&self, picture_ids: &[String]) {
        for picture_id in picture_ids {
            if let Err(e) = self.image_store.remove(picture_id).await {
                tracing::warn!("Failed to remove picture {}: {}", picture_id, e);
            }
        }
    }
}
