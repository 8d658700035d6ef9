//! License registry HTTP server.
//!
//! Configuration comes from `config.toml` and `LICREG_*` environment
//! variables; see [`licreg::config`].

use licreg::config::RegistryConfig;
use licreg::errors::{LicenseError, LicenseResult};
use licreg::server::{build_router, AppState, Database, LicenseRegistry};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Server failed: {e}");
        eprintln!("licreg_server: {e}");
        std::process::exit(1);
    }
}

async fn run() -> LicenseResult<()> {
    let config = RegistryConfig::load()?;

    tracing_subscriber::fmt()
        .with_max_level(config.logging.tracing_level()?)
        .with_target(false)
        .init();

    let db = Database::connect(&config.database).await?;
    db.init_schema().await?;
    info!("Database schema ready ({})", db.db_type());

    let registry = LicenseRegistry::new(db, config.license.key_prefix.clone());
    let app = build_router(AppState::new(registry), &config.cors);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LicenseError::ServerError(format!("failed to bind {addr}: {e}")))?;
    info!("License registry listening on http://{addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LicenseError::ServerError(format!("server error: {e}")))?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
