mod api;
mod backend;
mod chunker;
mod config;
mod error;
mod prompt;
mod relay;

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::{build_router, AppState};
use crate::backend::build_backend;
use crate::config::AppConfig;
use crate::relay::{Relay, RelaySettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_result = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_translate_relay=info,axum=info".into()),
        )
        .compact()
        .init();

    if let Err(err) = dotenv_result {
        if !err.not_found() {
            warn!(error = %err, "failed to load .env file");
        }
    }

    let cfg = AppConfig::from_env()?;
    let backend = build_backend(&cfg)?;
    let relay = Relay::new(backend, RelaySettings::from_config(&cfg));
    let state = Arc::new(AppState::new(cfg.clone(), relay));

    let app = build_router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        host = %cfg.host,
        port = cfg.port,
        model = %cfg.completion.model,
        chunk_limit = cfg.chunk_limit,
        chunk_strategy = cfg.chunk_strategy.as_str(),
        translate_parallelism = cfg.translate_parallelism,
        inbound_auth = cfg.api_key.is_some(),
        "starting chat-translate-relay"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
