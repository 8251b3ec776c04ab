use std::env;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tracing::warn;

use crate::services::token_service::TokenSettings;

const DEV_JWT_SECRET: &str = "dvota-development-secret-change-me";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("FATAL: {0}")]
    Insecure(String),
}

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl: ChronoDuration,
    pub refresh_token_ttl: ChronoDuration,
    pub reset_token_ttl: ChronoDuration,
    pub redis_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub upload_dir: String,
    pub base_url: String,
    pub user_cleanup_interval: Duration,
    pub otp_cleanup_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = current_environment();
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("PORT", 8080u16)?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set; using a development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());
        let cors_origins = env::var("CORS_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/dvota.db".to_string()),
            jwt_secret,
            access_token_ttl: ChronoDuration::minutes(parse_var("ACCESS_TOKEN_TTL_MINUTES", 120)?),
            refresh_token_ttl: ChronoDuration::days(parse_var("REFRESH_TOKEN_TTL_DAYS", 3)?),
            reset_token_ttl: ChronoDuration::minutes(parse_var("RESET_TOKEN_TTL_MINUTES", 5)?),
            redis_url,
            cors_origins,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{}", port)),
            user_cleanup_interval: Duration::from_secs(
                parse_var("USER_CLEANUP_INTERVAL_HOURS", 24u64)? * 3600,
            ),
            otp_cleanup_interval: Duration::from_secs(
                parse_var("OTP_CLEANUP_INTERVAL_MINUTES", 30u64)? * 60,
            ),
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            secret: self.jwt_secret.clone(),
            access_ttl: self.access_token_ttl,
            refresh_ttl: self.refresh_token_ttl,
            reset_ttl: self.reset_token_ttl,
        }
    }

    /// Refuses to run in production with a missing, short or placeholder
    /// JWT secret.
    pub fn validate_production(&self) -> Result<(), ConfigError> {
        if !self.is_production() {
            return Ok(());
        }

        let secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < 32 {
            return Err(ConfigError::Insecure(
                "JWT_SECRET must be at least 32 bytes in production".to_string(),
            ));
        }

        let lowered = secret.to_ascii_lowercase();
        if lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default")
        {
            return Err(ConfigError::Insecure(
                "JWT_SECRET appears to be a default value. Generate a secure secret!".to_string(),
            ));
        }

        Ok(())
    }
}

fn current_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(default),
    }
}
