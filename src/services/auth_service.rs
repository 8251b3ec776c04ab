use crate::models::otp::{Otp, OtpType};
use crate::models::user::{PublicUser, User};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::email_service::{EmailError, EmailService};
use crate::services::otp_service::{OtpError, OtpService};
use crate::services::token_blocklist::{BlocklistError, TokenBlocklist};
use crate::services::token_service::{Claims, TokenError, TokenService, TokenType};
use crate::services::user_service::{
    CreateUserRequest, UpdatePasswordRequest, UserService, UserServiceError,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Please verify your account before you can login")]
    EmailNotVerified,
    #[error("User not found")]
    UserNotFound,
    #[error("Email is not registered")]
    EmailNotRegistered,
    #[error("Account is already verified")]
    AlreadyVerified,
    #[error(transparent)]
    User(#[from] UserServiceError),
    #[error(transparent)]
    Otp(#[from] OtpError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Email error: {0}")]
    Email(#[from] EmailError),
    #[error("Blocklist error: {0}")]
    Blocklist(#[from] BlocklistError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

pub struct SignupRequest {
    pub fullname: String,
    pub email: String,
    pub password: String,
}

pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResult {
    #[serde(flatten)]
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

/// What a successful OTP verification yields, depending on the OTP type.
#[derive(Debug)]
pub enum VerifiedOtp {
    Signup(PublicUser),
    ForgotPassword { user_id: i64, reset_token: String },
}

pub struct AuthService {
    pool: SqlitePool,
    user_repository: Arc<dyn UserRepository>,
    user_service: Arc<UserService>,
    otp_service: Arc<OtpService>,
    token_service: Arc<TokenService>,
    blocklist: Arc<dyn TokenBlocklist>,
    email_service: Box<dyn EmailService>,
}

impl AuthService {
    pub fn new(
        pool: SqlitePool,
        user_repository: Arc<dyn UserRepository>,
        user_service: Arc<UserService>,
        otp_service: Arc<OtpService>,
        token_service: Arc<TokenService>,
        blocklist: Arc<dyn TokenBlocklist>,
        email_service: Box<dyn EmailService>,
    ) -> Self {
        Self {
            pool,
            user_repository,
            user_service,
            otp_service,
            token_service,
            blocklist,
            email_service,
        }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<PublicUser, AuthServiceError> {
        let user = self
            .user_service
            .create_user(CreateUserRequest {
                fullname: request.fullname,
                email: request.email,
                password: request.password,
                password_confirm: None,
                email_verified: false,
            })
            .await?;

        self.send_otp(&user, OtpType::Signup).await?;

        tracing::info!("User {} signed up, awaiting verification", user.id);
        Ok(user.into())
    }

    pub async fn resend_signup_otp(&self, email: &str) -> Result<(), AuthServiceError> {
        let user = self
            .user_repository
            .find_by_email(email)
            .await?
            .ok_or(AuthServiceError::EmailNotRegistered)?;

        if user.email_verified {
            return Err(AuthServiceError::AlreadyVerified);
        }

        self.send_otp(&user, OtpType::Signup).await
    }

    pub async fn verify_otp(
        &self,
        user_id: i64,
        code: &str,
        otp_type: OtpType,
    ) -> Result<VerifiedOtp, AuthServiceError> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        match otp_type {
            OtpType::Signup => {
                let mut tx = self.pool.begin().await?;
                let otp = self
                    .otp_service
                    .check(&mut tx, user.id, OtpType::Signup, code)
                    .await?;
                User::mark_verified(&mut *tx, user.id).await?;
                Otp::delete(&mut *tx, otp.id).await?;
                tx.commit().await?;

                if let Err(e) = self
                    .email_service
                    .send_welcome_email(&user.email, &user.fullname)
                    .await
                {
                    tracing::warn!("Failed to send welcome email to {}: {}", user.email, e);
                }

                let verified = User {
                    email_verified: true,
                    ..user
                };
                Ok(VerifiedOtp::Signup(verified.into()))
            }
            OtpType::ForgotPassword => {
                self.otp_service
                    .verify(user.id, OtpType::ForgotPassword, code)
                    .await?;
                let reset_token =
                    self.token_service
                        .issue(user.id, Some(&user.email), TokenType::Reset)?;
                Ok(VerifiedOtp::ForgotPassword {
                    user_id: user.id,
                    reset_token,
                })
            }
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResult, AuthServiceError> {
        let user = self
            .user_repository
            .find_by_email(&request.email)
            .await?
            .ok_or(AuthServiceError::InvalidCredentials)?;

        if !self
            .user_service
            .verify_password(&request.password, &user.password_hash)
        {
            return Err(AuthServiceError::InvalidCredentials);
        }

        if !user.email_verified {
            return Err(AuthServiceError::EmailNotVerified);
        }

        let access_token = self
            .token_service
            .issue(user.id, Some(&user.email), TokenType::Access)?;
        let refresh_token = self
            .token_service
            .issue(user.id, Some(&user.email), TokenType::Refresh)?;

        tracing::info!("User {} logged in", user.id);
        Ok(LoginResult {
            user: user.into(),
            access_token,
            refresh_token,
        })
    }

    /// Mails a password-reset code. Returns the user id the code must be
    /// verified against.
    pub async fn forgot_password(&self, email: &str) -> Result<i64, AuthServiceError> {
        let user = self
            .user_repository
            .find_by_email(email)
            .await?
            .ok_or(AuthServiceError::EmailNotRegistered)?;

        self.send_otp(&user, OtpType::ForgotPassword).await?;
        Ok(user.id)
    }

    /// Sets a new password using a reset token. The token is single-use.
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AuthServiceError> {
        let claims = self.verify_unrevoked(reset_token, TokenType::Reset).await?;

        self.user_service
            .update_password(UpdatePasswordRequest {
                user_id: claims.sub,
                new_password: new_password.to_string(),
                new_password_confirm: None,
            })
            .await
            .map_err(|e| match e {
                UserServiceError::UserNotFound => AuthServiceError::UserNotFound,
                other => AuthServiceError::User(other),
            })?;

        self.revoke(&claims).await?;
        tracing::info!("Password reset for user {}", claims.sub);
        Ok(())
    }

    pub async fn renew_access_token(&self, refresh_token: &str) -> Result<String, AuthServiceError> {
        let claims = self
            .verify_unrevoked(refresh_token, TokenType::Refresh)
            .await?;

        let user = self
            .user_repository
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        Ok(self
            .token_service
            .issue(user.id, Some(&user.email), TokenType::Access)?)
    }

    /// Revokes the access token and, when given, the caller's refresh token.
    pub async fn logout(
        &self,
        access_claims: &Claims,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthServiceError> {
        if let Some(refresh_token) = refresh_token {
            let refresh_claims = self
                .token_service
                .verify(refresh_token, TokenType::Refresh)?;
            if refresh_claims.sub != access_claims.sub {
                return Err(TokenError::InvalidToken.into());
            }
            self.revoke(&refresh_claims).await?;
        }

        self.revoke(access_claims).await?;
        tracing::info!("User {} logged out", access_claims.sub);
        Ok(())
    }

    /// Validates a bearer access token, including revocation.
    pub async fn authenticate_access_token(&self, token: &str) -> Result<Claims, AuthServiceError> {
        self.verify_unrevoked(token, TokenType::Access).await
    }

    async fn verify_unrevoked(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<Claims, AuthServiceError> {
        let claims = self.token_service.verify(token, expected)?;
        if self.blocklist.is_revoked(&claims.jti).await? {
            return Err(TokenError::Revoked.into());
        }
        Ok(claims)
    }

    async fn revoke(&self, claims: &Claims) -> Result<(), AuthServiceError> {
        let ttl = self.token_service.remaining_lifetime(claims);
        self.blocklist.revoke(&claims.jti, ttl).await?;
        Ok(())
    }

    async fn send_otp(&self, user: &User, otp_type: OtpType) -> Result<(), AuthServiceError> {
        let otp = self.otp_service.issue(user.id, otp_type).await?;

        match self
            .email_service
            .send_otp_email(&user.email, &user.fullname, &otp.code, otp_type)
            .await
        {
            Ok(_) => {
                tracing::info!("✅ OTP email sent to: {}", user.email);
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ Failed to send OTP email to {}: {:?}", user.email, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::repositories::user_repository::MockUserRepository;
    use crate::services::email_service::MockEmailService;
    use crate::services::token_blocklist::InMemoryTokenBlocklist;
    use crate::services::token_service::TokenSettings;
    use crate::test_utils::test_helpers;
    use mockall::predicate::*;

    async fn service_with(mock_repo: MockUserRepository) -> AuthService {
        let pool = test_helpers::create_test_db().await.unwrap();
        let clock: Arc<dyn crate::clock::Clock> = Arc::new(SystemClock);
        let repo: Arc<dyn UserRepository> = Arc::new(mock_repo);
        AuthService::new(
            pool.clone(),
            repo.clone(),
            Arc::new(UserService::new(repo)),
            Arc::new(OtpService::new(pool, clock.clone())),
            Arc::new(TokenService::new(TokenSettings::new("unit-test-secret"), clock)),
            Arc::new(InMemoryTokenBlocklist::new()),
            Box::new(MockEmailService::new()),
        )
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_find_by_email()
            .with(eq("test@example.com"))
            .times(1)
            .returning(|_| Box::pin(async move { Ok(None) }));

        let service = service_with(mock_repo).await;

        let request = LoginRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };

        let result = service.login(request).await;
        assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_find_by_email()
            .times(1)
            .returning(|_| Box::pin(async move { Ok(None) }));

        let service = service_with(mock_repo).await;

        let result = service.forgot_password("nobody@example.com").await;
        assert!(matches!(result, Err(AuthServiceError::EmailNotRegistered)));
    }

    #[tokio::test]
    async fn test_verify_otp_unknown_user() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_find_by_id()
            .with(eq(1))
            .times(1)
            .returning(|_| Box::pin(async move { Ok(None) }));

        let service = service_with(mock_repo).await;

        let result = service.verify_otp(1, "123456", OtpType::Signup).await;
        assert!(matches!(result, Err(AuthServiceError::UserNotFound)));
    }
}
