use crate::clock::Clock;
use crate::models::{Otp, User};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Accounts that stay unverified longer than this are purged.
pub const UNVERIFIED_USER_RETENTION_HOURS: i64 = 24;

pub struct CleanupService {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl CleanupService {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn purge_unverified_users(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let cutoff = now - Duration::hours(UNVERIFIED_USER_RETENTION_HOURS);
        let deleted = User::delete_unverified_before(&self.pool, cutoff).await?;
        if deleted > 0 {
            tracing::info!("Purged {} unverified user(s) created before {}", deleted, cutoff);
        }
        Ok(deleted)
    }

    pub async fn purge_expired_otps(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let deleted = Otp::delete_expired(&self.pool, now).await?;
        if deleted > 0 {
            tracing::info!("Purged {} expired OTP(s)", deleted);
        }
        Ok(deleted)
    }

    /// Runs both sweeps once at the current clock time.
    pub async fn run_once(&self) -> Result<(u64, u64), sqlx::Error> {
        let now = self.clock.now();
        let users = self.purge_unverified_users(now).await?;
        let otps = self.purge_expired_otps(now).await?;
        Ok((users, otps))
    }
}

/// Starts the periodic sweeps. Failures are logged and the loops keep going.
pub fn spawn_cleanup_jobs(
    service: Arc<CleanupService>,
    user_interval: std::time::Duration,
    otp_interval: std::time::Duration,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let users_job = {
        let service = service.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(user_interval);
            loop {
                ticker.tick().await;
                if let Err(e) = service.purge_unverified_users(service.clock.now()).await {
                    tracing::error!("Unverified user cleanup failed: {}", e);
                }
            }
        })
    };

    let otps_job = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(otp_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = service.purge_expired_otps(service.clock.now()).await {
                tracing::error!("Expired OTP cleanup failed: {}", e);
            }
        }
    });

    (users_job, otps_job)
}
