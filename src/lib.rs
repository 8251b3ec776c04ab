pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod response;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use clock::Clock;
use repositories::{SqliteUserRepository, UserRepository};
use services::{
    AuthService, ElectionService, EmailService, ImageStore, OtpService, TokenBlocklist,
    TokenService, TokenSettings, UserService, VotingService, WhitelistService,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub election_service: Arc<ElectionService>,
    pub whitelist_service: Arc<WhitelistService>,
    pub voting_service: Arc<VotingService>,
    pub pool: sqlx::SqlitePool,
}

/// External collaborators the services are wired with.
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub token_settings: TokenSettings,
    pub blocklist: Arc<dyn TokenBlocklist>,
    pub email_service: Box<dyn EmailService>,
    pub image_store: Arc<dyn ImageStore>,
}

impl AppState {
    pub fn new(pool: sqlx::SqlitePool, deps: Collaborators) -> Self {
        let Collaborators {
            clock,
            token_settings,
            blocklist,
            email_service,
            image_store,
        } = deps;

        let user_repository: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(pool.clone(), clock.clone()));
        let user_service = Arc::new(UserService::new(user_repository.clone()));
        let otp_service = Arc::new(OtpService::new(pool.clone(), clock.clone()));
        let token_service = Arc::new(TokenService::new(token_settings, clock.clone()));

        let auth_service = Arc::new(AuthService::new(
            pool.clone(),
            user_repository,
            user_service.clone(),
            otp_service,
            token_service,
            blocklist,
            email_service,
        ));

        Self {
            user_service,
            auth_service,
            election_service: Arc::new(ElectionService::new(
                pool.clone(),
                clock.clone(),
                image_store.clone(),
            )),
            whitelist_service: Arc::new(WhitelistService::new(pool.clone(), clock.clone())),
            voting_service: Arc::new(VotingService::new(pool.clone(), clock, image_store)),
            pool,
        }
    }
}
