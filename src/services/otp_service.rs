use crate::clock::Clock;
use crate::models::otp::{Otp, OtpType};
use chrono::Duration;
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("No OTP found for this user")]
    OtpNotFound,
    #[error("Invalid OTP code")]
    InvalidOtp,
    #[error("OTP expired, request a new one")]
    OtpExpired,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl OtpType {
    /// How long a freshly issued code of this type stays valid.
    pub fn lifetime(self) -> Duration {
        match self {
            OtpType::Signup => Duration::minutes(10),
            OtpType::ForgotPassword => Duration::minutes(5),
        }
    }
}

pub struct OtpService {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl OtpService {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000u32))
    }

    pub async fn issue(&self, user_id: i64, otp_type: OtpType) -> Result<Otp, OtpError> {
        let now = self.clock.now();
        let code = Self::generate_code();
        let otp = Otp::insert(
            &self.pool,
            user_id,
            otp_type,
            &code,
            now,
            now + otp_type.lifetime(),
        )
        .await?;

        tracing::debug!("Issued {:?} OTP for user {}", otp_type, user_id);
        Ok(otp)
    }

    /// Checks `code` against the most recent OTP of `otp_type` for the user,
    /// on the caller's connection. The code is not consumed.
    pub async fn check(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        otp_type: OtpType,
        code: &str,
    ) -> Result<Otp, OtpError> {
        let otp = Otp::latest_for_user(&mut *conn, user_id, otp_type)
            .await?
            .ok_or(OtpError::OtpNotFound)?;

        if otp.code != code.trim() {
            return Err(OtpError::InvalidOtp);
        }

        if otp.is_expired(self.clock.now()) {
            return Err(OtpError::OtpExpired);
        }

        Ok(otp)
    }

    /// Checks and consumes a code in one transaction.
    pub async fn verify(&self, user_id: i64, otp_type: OtpType, code: &str) -> Result<(), OtpError> {
        let mut tx = self.pool.begin().await?;
        let otp = self.check(&mut tx, user_id, otp_type, code).await?;
        Otp::delete(&mut *tx, otp.id).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::test_utils::{create_test_pool, create_test_user};

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = OtpService::generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_lifetimes() {
        assert_eq!(OtpType::Signup.lifetime(), Duration::minutes(10));
        assert_eq!(OtpType::ForgotPassword.lifetime(), Duration::minutes(5));
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_then_expired_code() {
        let pool = create_test_pool().await;
        let user_id = create_test_user(&pool, "Ada Obi", "ada@example.com")
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let service = OtpService::new(pool, clock.clone());

        let otp = service.issue(user_id, OtpType::ForgotPassword).await.unwrap();
        let wrong = if otp.code == "000000" { "111111" } else { "000000" };

        let result = service.verify(user_id, OtpType::ForgotPassword, wrong).await;
        assert!(matches!(result, Err(OtpError::InvalidOtp)));

        clock.advance(Duration::minutes(6));
        let result = service
            .verify(user_id, OtpType::ForgotPassword, &otp.code)
            .await;
        assert!(matches!(result, Err(OtpError::OtpExpired)));
    }

    #[tokio::test]
    async fn test_verified_code_is_consumed() {
        let pool = create_test_pool().await;
        let user_id = create_test_user(&pool, "Ada Obi", "ada@example.com")
            .await
            .unwrap();
        let service = OtpService::new(pool, Arc::new(crate::clock::SystemClock));

        let otp = service.issue(user_id, OtpType::Signup).await.unwrap();
        service
            .verify(user_id, OtpType::Signup, &otp.code)
            .await
            .unwrap();

        let again = service.verify(user_id, OtpType::Signup, &otp.code).await;
        assert!(matches!(again, Err(OtpError::OtpNotFound)));
    }
}
