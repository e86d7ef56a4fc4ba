pub mod api;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod validation;

use tokio::sync::watch;

use crate::api::AppState;
use crate::config::Config;
use crate::error::AppError;

/// Start the backend and block until Ctrl-C.
pub fn run() {
    logging::init();

    tracing::info!("Starting El Nieto Tech v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve()) {
        tracing::error!(kind = e.kind(), "Server stopped: {}", e);
        std::process::exit(1);
    }
}

async fn serve() -> Result<(), AppError> {
    let config = Config::from_env()?;
    tracing::info!(
        chat_model = %config.chat_model,
        image_model = %config.image_model,
        "Configuration loaded"
    );
    let state = AppState::from_config(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    api::start_server(state, config.bind_addr, shutdown_rx).await
}
