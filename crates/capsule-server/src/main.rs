mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tracing::info;

use capsule_api::media::MediaStore;
use capsule_api::state::{AppState, AppStateInner};
use capsule_db::{CapsuleStore, Database};
use capsule_types::clock::SystemClock;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "capsule=debug,capsule_api=debug,capsule_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and media storage
    let db = Arc::new(Database::open_location(&config.db_location, config.db_timeout)?);
    let media = MediaStore::new(config.media_dir.clone()).await?;
    let store = CapsuleStore::new(db.clone(), Arc::new(SystemClock));

    let state: AppState = Arc::new(AppStateInner {
        db,
        store,
        media,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: config.token_ttl,
        db_timeout: config.db_timeout,
    });

    let app = capsule_api::router(state).layer(CorsLayer::permissive());

    info!("Capsule server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
