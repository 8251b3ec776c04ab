use crate::models::user::User;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Full name is required")]
    MissingFullname,
    #[error("Password too weak (minimum 8 characters)")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

pub struct CreateUserRequest {
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub email_verified: bool,
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

/// Addresses are compared and stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Argon2id hash in PHC string form.
pub fn hash_password(password: &str) -> Result<String, UserServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserServiceError::HashingError(e.to_string()))
}

fn check_password(password: &str, confirm: Option<&str>) -> Result<(), UserServiceError> {
    if confirm.is_some_and(|confirm| confirm != password) {
        return Err(UserServiceError::PasswordMismatch);
    }
    if password.len() < 8 {
        return Err(UserServiceError::WeakPassword);
    }
    Ok(())
}

fn missing_user(err: RepositoryError) -> UserServiceError {
    match err {
        RepositoryError::NotFound => UserServiceError::UserNotFound,
        RepositoryError::AlreadyExists => UserServiceError::EmailTaken,
        e => UserServiceError::RepositoryError(e),
    }
}

/// Account management shared by the signup flow and the admin CLI.
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let fullname = request.fullname.trim();
        if fullname.is_empty() {
            return Err(UserServiceError::MissingFullname);
        }

        let email = normalize_email(&request.email);
        if email.len() > 255 || !EMAIL_PATTERN.is_match(&email) {
            return Err(UserServiceError::InvalidEmail);
        }

        check_password(&request.password, request.password_confirm.as_deref())?;
        let password_hash = hash_password(&request.password)?;

        self.repository
            .create_user(fullname, &email, &password_hash, request.email_verified)
            .await
            .map_err(missing_user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(&normalize_email(email)).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        self.repository.delete_user(id).await.map_err(missing_user)
    }

    pub async fn verify_user_email(&self, id: i64) -> Result<(), UserServiceError> {
        self.repository.verify_email(id).await.map_err(missing_user)
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        check_password(
            &request.new_password,
            request.new_password_confirm.as_deref(),
        )?;
        let password_hash = hash_password(&request.new_password)?;

        self.repository
            .update_password(request.user_id, &password_hash)
            .await
            .map_err(missing_user)
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        PasswordHash::new(password_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}
