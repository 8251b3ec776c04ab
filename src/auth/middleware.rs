use crate::error::AppError;
use crate::services::token_service::Claims;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Identity of the caller, attached to the request by [`require_bearer`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: Option<String>,
    pub claims: Claims,
}

/// Extract Bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header".to_string()))?;

    Ok(token.to_string())
}

/// Rejects requests without a valid, unrevoked access token.
pub async fn require_bearer(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&headers)?;
    let claims = state.auth_service.authenticate_access_token(&token).await?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        email: claims.email.clone(),
        claims,
    });

    Ok(next.run(request).await)
}
