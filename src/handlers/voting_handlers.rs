use crate::auth::AuthUser;
use crate::error::Result;
use crate::models::Vote;
use crate::response::ApiReply;
use crate::services::voting_service::{
    BallotEntry, CastVoteRequest, ElectionDetails, ElectionResults,
};
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};

pub async fn vote(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: std::result::Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<ApiReply<Vote>> {
    let Json(body) = body?;
    let vote = state
        .voting_service
        .cast_vote(auth_user.user_id, body)
        .await?;
    Ok(ApiReply::created("Vote recorded", vote))
}

pub async fn get_election_details(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    election_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<ApiReply<ElectionDetails>> {
    let Path(election_id) = election_id?;
    let details = state
        .voting_service
        .election_details(auth_user.user_id, election_id)
        .await?;
    Ok(ApiReply::ok("Election details", details))
}

pub async fn get_election_result(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    election_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<ApiReply<ElectionResults>> {
    let Path(election_id) = election_id?;
    let results = state
        .voting_service
        .election_results(auth_user.user_id, election_id)
        .await?;
    Ok(ApiReply::ok("Election results", results))
}

pub async fn get_my_ballot(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<ApiReply<Vec<BallotEntry>>> {
    let ballot = state.voting_service.my_ballot(auth_user.user_id).await?;
    Ok(ApiReply::ok("Your ballot", ballot))
}
