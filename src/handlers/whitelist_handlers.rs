use crate::auth::AuthUser;
use crate::error::Result;
use crate::response::ApiReply;
use crate::services::whitelist_service::WhitelistReport;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
pub struct AddAllowedVotersBody {
    election_id: i64,
    emails: Vec<String>,
}

#[derive(Deserialize)]
pub struct RemoveAllowedVoterBody {
    election_id: i64,
    email: String,
}

pub async fn add_allowed_voters(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: std::result::Result<Json<AddAllowedVotersBody>, JsonRejection>,
) -> Result<ApiReply<WhitelistReport>> {
    let Json(body) = body?;
    let report = state
        .whitelist_service
        .add_allowed_voters(auth_user.user_id, body.election_id, &body.emails)
        .await?;

    let message = format!("{} voter(s) added to the whitelist", report.added_count);
    Ok(ApiReply::ok(message, report))
}

pub async fn delete_allowed_voter(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: std::result::Result<Json<RemoveAllowedVoterBody>, JsonRejection>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    state
        .whitelist_service
        .remove_allowed_voter(auth_user.user_id, body.election_id, &body.email)
        .await?;
    Ok(ApiReply::message("Voter removed from the whitelist"))
}
