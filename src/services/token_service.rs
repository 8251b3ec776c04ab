use crate::clock::Clock;
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

const EXPIRY_LEEWAY_SECONDS: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Wrong token type")]
    WrongTokenType,
    #[error("Token has been revoked")]
    Revoked,
    #[error("Failed to issue token: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: i64,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_ttl: Duration,
}

impl TokenSettings {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::hours(2),
            refresh_ttl: Duration::days(3),
            reset_ttl: Duration::minutes(5),
        }
    }
}

/// Issues and verifies HS256 JWTs. Expiry is judged by the injected clock.
pub struct TokenService {
    settings: TokenSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(settings: TokenSettings, clock: Arc<dyn Clock>) -> Self {
        let encoding_key = EncodingKey::from_secret(settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(settings.secret.as_bytes());
        Self {
            settings,
            encoding_key,
            decoding_key,
            clock,
        }
    }

    fn ttl(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.settings.access_ttl,
            TokenType::Refresh => self.settings.refresh_ttl,
            TokenType::Reset => self.settings.reset_ttl,
        }
    }

    pub fn issue(
        &self,
        user_id: i64,
        email: Option<&str>,
        token_type: TokenType,
    ) -> Result<String, TokenError> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl(token_type)).timestamp(),
            token_type,
            email: email.map(str::to_string),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Decodes `token`, checks its signature, expiry and type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::InvalidToken)?
            .claims;

        if self.clock.now().timestamp() > claims.exp + EXPIRY_LEEWAY_SECONDS {
            return Err(TokenError::TokenExpired);
        }

        if claims.token_type != expected {
            return Err(TokenError::WrongTokenType);
        }

        Ok(claims)
    }

    /// Time left before the token expires on its own, never negative.
    pub fn remaining_lifetime(&self, claims: &Claims) -> std::time::Duration {
        let remaining = claims.exp + EXPIRY_LEEWAY_SECONDS - self.clock.now().timestamp();
        std::time::Duration::from_secs(remaining.max(0) as u64)
    }
}
