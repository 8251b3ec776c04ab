use crate::repositories::user_repository::RepositoryError;
use crate::response::ApiResponse;
use crate::services::{
    auth_service::AuthServiceError, election_service::ElectionError, email_service::EmailError,
    image_store::ImageStoreError, otp_service::OtpError, token_blocklist::BlocklistError,
    token_service::TokenError, user_service::UserServiceError,
};
use axum::{
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// HTTP-facing error taxonomy. Every service error converts into one of these.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    MalformedRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::MalformedRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::MalformedRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::MalformedRequest(err.body_text())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => AppError::Database(e),
            RepositoryError::NotFound => AppError::NotFound(err.to_string()),
            RepositoryError::AlreadyExists => AppError::Conflict(err.to_string()),
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InvalidEmail
            | UserServiceError::MissingFullname
            | UserServiceError::WeakPassword
            | UserServiceError::PasswordMismatch => AppError::Validation(err.to_string()),
            UserServiceError::UserNotFound => AppError::NotFound(err.to_string()),
            UserServiceError::EmailTaken => AppError::Conflict(err.to_string()),
            UserServiceError::HashingError(msg) => AppError::Internal(msg),
            UserServiceError::RepositoryError(e) => e.into(),
        }
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::DatabaseError(e) => AppError::Database(e),
            OtpError::OtpNotFound | OtpError::InvalidOtp | OtpError::OtpExpired => {
                AppError::Validation(err.to_string())
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encoding(msg) => AppError::Internal(msg),
            _ => AppError::Unauthorized(err.to_string()),
        }
    }
}

impl From<EmailError> for AppError {
    fn from(err: EmailError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<BlocklistError> for AppError {
    fn from(err: BlocklistError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ImageStoreError> for AppError {
    fn from(err: ImageStoreError) -> Self {
        match err {
            ImageStoreError::Io(e) => AppError::Internal(e.to_string()),
            _ => AppError::Validation(err.to_string()),
        }
    }
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidCredentials | AuthServiceError::EmailNotVerified => {
                AppError::Unauthorized(err.to_string())
            }
            AuthServiceError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthServiceError::EmailNotRegistered | AuthServiceError::AlreadyVerified => {
                AppError::Validation(err.to_string())
            }
            AuthServiceError::User(e) => e.into(),
            AuthServiceError::Otp(e) => e.into(),
            AuthServiceError::Token(e) => e.into(),
            AuthServiceError::Email(e) => e.into(),
            AuthServiceError::Blocklist(e) => e.into(),
            AuthServiceError::RepositoryError(e) => e.into(),
            AuthServiceError::DatabaseError(e) => AppError::Database(e),
        }
    }
}

impl From<ElectionError> for AppError {
    fn from(err: ElectionError) -> Self {
        use ElectionError::*;
        match err {
            ElectionNotFound | PositionNotFound | CandidateNotFound | UserNotFound
            | NotOnWhitelist => AppError::NotFound(err.to_string()),
            NotCreator | StructuralLock | ElectionNotStarted | ElectionEnded => {
                AppError::Forbidden(err.to_string())
            }
            NotWhitelisted => AppError::Unauthorized(err.to_string()),
            InvalidTimeWindow(_) | Validation(_) | InvalidCandidate | CandidateNotForPosition => {
                AppError::Validation(err.to_string())
            }
            DuplicateElectionName | DuplicatePositionName | DuplicateCandidate | AlreadyVoted => {
                AppError::Conflict(err.to_string())
            }
            Image(e) => e.into(),
            Database(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
            AppError::NotFound(msg)
            | AppError::Forbidden(msg)
            | AppError::Unauthorized(msg)
            | AppError::Conflict(msg)
            | AppError::Validation(msg)
            | AppError::MalformedRequest(msg) => msg,
        };

        (status, Json(ApiResponse::error(message))).into_response()
    }
}
