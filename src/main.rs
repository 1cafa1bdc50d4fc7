use delivery_notes::{
    config::{validate_production_config, AppConfig},
    db, routes,
    services::{create_email_service, create_upload_service, EmailService, UploadService},
    AppState,
};

use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "delivery_notes=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    validate_production_config();
    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    std::fs::create_dir_all(&config.upload_dir)?;
    std::fs::create_dir_all(&config.temp_dir)?;

    let email: Arc<dyn EmailService> = Arc::from(create_email_service());
    let uploader: Arc<dyn UploadService> = Arc::from(create_upload_service(&config));

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    let state = AppState::new(pool, config, email, uploader);
    let app = routes::build_router(state);

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
