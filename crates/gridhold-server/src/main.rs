mod config;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use gridhold_api::AppStateInner;
use gridhold_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridhold=debug,gridhold_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;
    promote_admins(&db, &config.admins)?;

    let state = AppStateInner::new(db, config.jwt_secret, config.environment);

    let app = gridhold_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("gridhold listening on {} ({})", config.addr, config.environment);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Grants the `admin` role to each listed account that exists.
fn promote_admins(db: &Database, usernames: &[String]) -> anyhow::Result<()> {
    for name in usernames {
        if db.set_user_role(name, "admin")? {
            info!("Granted admin role to {}", name);
        } else {
            warn!("GRIDHOLD_ADMINS lists unknown user {}", name);
        }
    }
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
            Err(_) => {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_admins_are_promoted() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "hash").unwrap();
        db.create_user("u2", "bob", "hash").unwrap();

        promote_admins(&db, &["alice".into(), "ghost".into()]).unwrap();

        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().role, "admin");
        assert_eq!(db.get_user_by_username("bob").unwrap().unwrap().role, "user");
    }
}
