use dvota::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    db, routes,
    services::{
        create_email_service, spawn_cleanup_jobs, CleanupService, InMemoryTokenBlocklist,
        LocalImageStore, RedisTokenBlocklist, TokenBlocklist,
    },
    AppState, Collaborators,
};

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dvota=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    config.validate_production()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let blocklist: Arc<dyn TokenBlocklist> = match &config.redis_url {
        Some(redis_url) => {
            tracing::info!("Using Redis token blocklist");
            Arc::new(RedisTokenBlocklist::connect(redis_url).await?)
        }
        None => {
            if config.is_production() {
                tracing::warn!("REDIS_URL not set; revoked tokens will not survive a restart");
            }
            Arc::new(InMemoryTokenBlocklist::new())
        }
    };

    std::fs::create_dir_all(&config.upload_dir)?;
    let image_store = Arc::new(LocalImageStore::new(&config.upload_dir, &config.base_url));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let app_state = AppState::new(
        pool.clone(),
        Collaborators {
            clock: clock.clone(),
            token_settings: config.token_settings(),
            blocklist,
            email_service: create_email_service(),
            image_store,
        },
    );

    let cleanup = Arc::new(CleanupService::new(pool, clock));
    spawn_cleanup_jobs(
        cleanup,
        config.user_cleanup_interval,
        config.otp_cleanup_interval,
    );

    let app = routes::build_router(
        app_state,
        &config.upload_dir,
        routes::cors_layer(&config.cors_origins),
    );

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
