mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use pantry_api::auth::{AppState, AppStateInner};
use pantry_claims::{ClaimArbiter, LifecycleController, Ports, Sweeper};
use pantry_db::Database;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pantry=debug,pantry_api=debug,pantry_claims=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    if !config.has_usable_secret() {
        eprintln!("FATAL: PANTRY_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let ports = Ports::sqlite(db.clone());

    let sweeper = Sweeper::new(ports.clone(), config.arbiter.intent_ttl());
    tokio::spawn(sweeper.run(config.sweep_every));

    info!(
        "Settling interval {:?}, orphaned intents swept after {:?}",
        config.arbiter.settling_interval,
        config.arbiter.intent_ttl()
    );

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        arbiter: Arc::new(ClaimArbiter::new(ports.clone(), config.arbiter.clone())),
        lifecycle: Arc::new(LifecycleController::new(ports.clone())),
        ports,
        retry: config.retry.clone(),
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = pantry_api::router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Pantry server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
