use crate::auth::AuthUser;
use crate::error::{AppError, Result};
use crate::models::{OtpType, PublicUser};
use crate::response::ApiReply;
use crate::services::auth_service::{LoginRequest, LoginResult, SignupRequest, VerifiedOtp};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct SignupBody {
    #[serde(alias = "fullName")]
    fullname: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct EmailBody {
    email: String,
}

#[derive(Deserialize)]
pub struct VerifyOtpBody {
    user_id: i64,
    otp: String,
    otp_type: OtpType,
}

#[derive(Deserialize)]
pub struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordBody {
    reset_token: String,
    new_password: String,
}

#[derive(Deserialize)]
pub struct RefreshTokenBody {
    refresh_token: String,
}

#[derive(Deserialize, Default)]
pub struct LogoutBody {
    refresh_token: Option<String>,
}

pub async fn signup(
    State(state): State<AppState>,
    body: std::result::Result<Json<SignupBody>, JsonRejection>,
) -> Result<ApiReply<PublicUser>> {
    let Json(body) = body?;
    let user = state
        .auth_service
        .signup(SignupRequest {
            fullname: body.fullname,
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(ApiReply::created(
        "Account created. Check your email for the verification code",
        user,
    ))
}

pub async fn resend_otp(
    State(state): State<AppState>,
    body: std::result::Result<Json<EmailBody>, JsonRejection>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    state.auth_service.resend_signup_otp(&body.email).await?;
    Ok(ApiReply::message("A new verification code has been sent"))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    body: std::result::Result<Json<VerifyOtpBody>, JsonRejection>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    let outcome = state
        .auth_service
        .verify_otp(body.user_id, &body.otp, body.otp_type)
        .await?;

    let reply = match outcome {
        VerifiedOtp::Signup(user) => ApiReply::ok(
            "Email verified",
            serde_json::to_value(user).map_err(|e| AppError::Internal(e.to_string()))?,
        ),
        VerifiedOtp::ForgotPassword {
            user_id,
            reset_token,
        } => ApiReply::ok(
            "OTP verified. Use the reset token to set a new password",
            json!({ "user_id": user_id, "reset_token": reset_token }),
        ),
    };
    Ok(reply)
}

pub async fn login(
    State(state): State<AppState>,
    body: std::result::Result<Json<LoginBody>, JsonRejection>,
) -> Result<ApiReply<LoginResult>> {
    let Json(body) = body?;
    let result = state
        .auth_service
        .login(LoginRequest {
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(ApiReply::ok("Login successful", result))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    body: std::result::Result<Json<EmailBody>, JsonRejection>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    let user_id = state.auth_service.forgot_password(&body.email).await?;
    Ok(ApiReply::ok(
        "A password reset code has been sent to your email",
        json!({ "user_id": user_id }),
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    body: std::result::Result<Json<ResetPasswordBody>, JsonRejection>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    state
        .auth_service
        .reset_password(&body.reset_token, &body.new_password)
        .await?;
    Ok(ApiReply::message("Password has been reset"))
}

pub async fn renew_token(
    State(state): State<AppState>,
    body: std::result::Result<Json<RefreshTokenBody>, JsonRejection>,
) -> Result<ApiReply<Value>> {
    let Json(body) = body?;
    let access_token = state
        .auth_service
        .renew_access_token(&body.refresh_token)
        .await?;
    Ok(ApiReply::ok(
        "Access token renewed",
        json!({ "access_token": access_token }),
    ))
}

/// The body is optional; when it carries a refresh token that token is
/// revoked as well.
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    body: Bytes,
) -> Result<ApiReply<Value>> {
    let body: LogoutBody = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::MalformedRequest(e.to_string()))?
    };

    state
        .auth_service
        .logout(&auth_user.claims, body.refresh_token.as_deref())
        .await?;
    Ok(ApiReply::message("Logged out"))
}
