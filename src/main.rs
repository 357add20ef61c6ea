mod config;
mod database;
mod leaderboard;
mod logging;
mod util;
mod web;

use tokio::net::TcpListener;
use tracing::info;

use crate::database::database_access;
use crate::database::high_scores_db::ScoreStore;
use crate::leaderboard::Leaderboard;

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> Result<(), Error> {
    if std::env::var("RUST_BACKTRACE").is_err() {
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    let cfg = config::load_config()?;

    // The local UTC offset for log timestamps can only be read while single-threaded.
    logging::init(&cfg.log)?;
    info!("Logging Initialised. Initialising tetris-scores");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cfg))
}

async fn run(cfg: config::AppConfig) -> Result<(), Error> {
    let db = database_access::connect(&cfg.database).await?;
    let store = ScoreStore::new(db);
    info!(stored_scores = store.count().await?, "Score database ready");

    let leaderboard = Leaderboard::new(store, cfg.leaderboard);
    info!(size = leaderboard.size(), "Leaderboard initialised");

    let app = web::router(
        web::AppState::new(leaderboard),
        &cfg.static_dir,
        &cfg.server.cors_origins,
    )?;

    let listener = TcpListener::bind(cfg.server.addr).await?;
    info!(addr = %cfg.server.addr, static_dir = %cfg.static_dir.display(), "Setup complete. Listening for requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "Could not listen for Ctrl-C");
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
                tracing::error!(error = ?e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
