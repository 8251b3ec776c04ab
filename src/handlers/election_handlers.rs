use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{CandidateView, Election, Position};
use crate::response::ApiReply;
use crate::services::election_service::{CandidateUpdate, ElectionUpdate, NewCandidate, NewElection};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

#[derive(Deserialize)]
pub struct ElectionIdBody {
    election_id: i64,
}

#[derive(Deserialize)]
pub struct NewPositionBody {
    election_id: i64,
    #[serde(alias = "position_name")]
    name: String,
}

#[derive(Deserialize)]
pub struct EditPositionBody {
    election_id: i64,
    position_id: i64,
    #[serde(alias = "position_name")]
    name: String,
}

#[derive(Deserialize)]
pub struct PositionRefBody {
    election_id: i64,
    position_id: i64,
}

#[derive(Deserialize)]
pub struct CandidateRefBody {
    election_id: i64,
    candidate_id: i64,
}

pub async fn create_election(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<NewElection>,
) -> Result<ApiReply<Election>> {
    let Json(body) = body?;
    let election = state
        .election_service
        .create_election(auth_user.user_id, body)
        .await?;
    Ok(ApiReply::created("Election created", election))
}

pub async fn edit_election(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<ElectionUpdate>,
) -> Result<ApiReply<Election>> {
    let Json(body) = body?;
    let election = state
        .election_service
        .update_election(auth_user.user_id, body)
        .await?;
    Ok(ApiReply::ok("Election updated", election))
}

pub async fn delete_election(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<ElectionIdBody>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    state
        .election_service
        .delete_election(auth_user.user_id, body.election_id)
        .await?;
    Ok(ApiReply::message("Election deleted"))
}

pub async fn add_position(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<NewPositionBody>,
) -> Result<ApiReply<Position>> {
    let Json(body) = body?;
    let position = state
        .election_service
        .add_position(auth_user.user_id, body.election_id, &body.name)
        .await?;
    Ok(ApiReply::created("Position created", position))
}

pub async fn edit_position(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<EditPositionBody>,
) -> Result<ApiReply<Position>> {
    let Json(body) = body?;
    let position = state
        .election_service
        .rename_position(auth_user.user_id, body.election_id, body.position_id, &body.name)
        .await?;
    Ok(ApiReply::ok("Position updated", position))
}

pub async fn delete_position(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<PositionRefBody>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    state
        .election_service
        .delete_position(auth_user.user_id, body.election_id, body.position_id)
        .await?;
    Ok(ApiReply::message("Position deleted"))
}

pub async fn add_candidate(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<NewCandidate>,
) -> Result<ApiReply<CandidateView>> {
    let Json(body) = body?;
    let candidate = state
        .election_service
        .add_candidate(auth_user.user_id, body)
        .await?;
    Ok(ApiReply::created("Candidate added", candidate))
}

pub async fn edit_candidate(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<CandidateUpdate>,
) -> Result<ApiReply<CandidateView>> {
    let Json(body) = body?;
    let candidate = state
        .election_service
        .update_candidate(auth_user.user_id, body)
        .await?;
    Ok(ApiReply::ok("Candidate updated", candidate))
}

pub async fn delete_candidate(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: JsonBody<CandidateRefBody>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    state
        .election_service
        .delete_candidate(auth_user.user_id, body.election_id, body.candidate_id)
        .await?;
    Ok(ApiReply::message("Candidate deleted"))
}

/// Multipart form with `election_id`, `candidate_id` and a `file` part.
pub async fn upload_candidate_picture(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<ApiReply<CandidateView>> {
    let mut election_id = None;
    let mut candidate_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("election_id") => election_id = Some(parse_id_field(&field.text().await?)?),
            Some("candidate_id") => candidate_id = Some(parse_id_field(&field.text().await?)?),
            Some("file") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                file = Some((field.bytes().await?, content_type));
            }
            _ => {}
        }
    }

    let missing = |name: &str| AppError::Validation(format!("{} is required", name));
    let election_id = election_id.ok_or_else(|| missing("election_id"))?;
    let candidate_id = candidate_id.ok_or_else(|| missing("candidate_id"))?;
    let (bytes, content_type) = file.ok_or_else(|| missing("file"))?;

    let candidate = state
        .election_service
        .set_candidate_picture(
            auth_user.user_id,
            election_id,
            candidate_id,
            &bytes,
            &content_type,
        )
        .await?;
    Ok(ApiReply::ok("Candidate picture updated", candidate))
}

fn parse_id_field(value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("Invalid id: {}", value)))
}
