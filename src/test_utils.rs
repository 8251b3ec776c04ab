pub mod test_helpers {
    use crate::clock::{Clock, ManualClock};
    use crate::models::User;
    use crate::routes;
    use crate::services::{
        user_service::hash_password, InMemoryTokenBlocklist, LocalImageStore, MockEmailService,
        TokenSettings,
    };
    use crate::{AppState, Collaborators};
    use chrono::{DateTime, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::sync::Arc;
    use tempfile::TempDir;

    pub const TEST_JWT_SECRET: &str = "integration-test-secret-with-enough-bytes";

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// File-backed database built with the production pool settings
    /// (several connections, WAL), for tests that need real concurrency.
    pub async fn create_test_db_file() -> Result<(SqlitePool, TempDir), sqlx::Error> {
        let dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let db_path = dir
            .path()
            .join("dvota.db")
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?
            .to_string();

        let pool = crate::db::create_pool(&format!("sqlite://{}", db_path)).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, dir))
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        fullname: &str,
        email: &str,
        password: &str,
        verified: bool,
    ) -> Result<i64, sqlx::Error> {
        insert_test_user_at(pool, fullname, email, password, verified, Utc::now()).await
    }

    /// Same as [`insert_test_user`] with an explicit creation time.
    pub async fn insert_test_user_at(
        pool: &SqlitePool,
        fullname: &str,
        email: &str,
        password: &str,
        verified: bool,
        created_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let password_hash = hash_password(password).map_err(|e| {
            sqlx::Error::Configuration(e.to_string().into())
        })?;

        let user = User::insert(pool, fullname, email, &password_hash, verified, created_at).await?;
        Ok(user.id)
    }

    /// A fully wired application on an in-memory database, with a clock the
    /// test controls and pictures written to a temporary directory.
    pub struct TestApp {
        pub state: AppState,
        pub router: axum::Router,
        pub clock: Arc<ManualClock>,
        pub pool: SqlitePool,
        pub upload_dir: TempDir,
    }

    pub async fn spawn_test_app() -> Result<TestApp, sqlx::Error> {
        let pool = create_test_db().await?;
        let upload_dir = tempfile::tempdir().map_err(sqlx::Error::Io)?;
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let state = AppState::new(
            pool.clone(),
            Collaborators {
                clock: clock.clone() as Arc<dyn Clock>,
                token_settings: TokenSettings::new(TEST_JWT_SECRET),
                blocklist: Arc::new(InMemoryTokenBlocklist::new()),
                email_service: Box::new(MockEmailService::new()),
                image_store: Arc::new(LocalImageStore::new(
                    upload_dir.path(),
                    "http://localhost:8080",
                )),
            },
        );

        let router = routes::build_router(state.clone(), upload_dir.path(), routes::cors_layer(&[]));

        Ok(TestApp {
            state,
            router,
            clock,
            pool,
            upload_dir,
        })
    }
}

// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}

#[cfg(test)]
pub async fn create_test_user(
    pool: &sqlx::SqlitePool,
    fullname: &str,
    email: &str,
) -> Result<i64, sqlx::Error> {
    test_helpers::insert_test_user(pool, fullname, email, "password123", true).await
}
