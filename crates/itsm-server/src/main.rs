mod config;

use std::net::SocketAddr;

use axum::Router;
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use itsm_api::auth::{ensure_admin, prime_login};
use itsm_api::cleanup::run_session_cleanup_loop;
use itsm_api::{AppStateInner, AuthSettings};
use itsm_db::{Database, format_timestamp};

use config::Config;

const SESSION_CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "itsm=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;
    let purged = db.purge_expired_sessions(&format_timestamp(Utc::now()))?;
    if purged > 0 {
        info!("Dropped {} expired sessions", purged);
    }

    let mut auth = AuthSettings::new(config.jwt_secret.clone());
    auth.session_ttl = config.session_ttl;
    auth.cookie_secure = config.cookie_secure;
    let state = AppStateInner::new(db, auth);

    if let Some(seed) = &config.admin {
        ensure_admin(&state, &seed.username, &seed.password)?;
    }
    prime_login(&state)?;

    tokio::spawn(run_session_cleanup_loop(
        state.clone(),
        SESSION_CLEANUP_INTERVAL_SECS,
    ));

    let app = itsm_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let primary = serve(app.clone(), &config.host, config.port, "ITSM server");
    match config.client_port {
        Some(client_port) => {
            let client = serve(app, &config.host, client_port, "ITSM client listener");
            tokio::try_join!(primary, client)?;
        }
        None => primary.await?,
    }

    Ok(())
}

async fn serve(app: Router, host: &str, port: u16, name: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("{} listening on {}", name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("{} stopped", name);
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
                warn!("Could not install SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("Received Ctrl+C, shutting down...");
    }
}
