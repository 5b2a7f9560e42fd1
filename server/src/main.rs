use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tts_core::{KokoroModel, TtsManager};

use server::config::ServerConfig;
use server::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting TTS server...");

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, workers={}, stream_mode={}, timeout={}s",
        config.port,
        config.workers,
        config.stream_mode.as_str(),
        config.request_timeout_secs
    );

    // The model is loaded once; no traffic is accepted if this fails.
    info!("Loading Kokoro model from {}...", config.model_path);
    let model = KokoroModel::load(&config.model_path, &config.voices_path, &config.kokoro_options())
        .context("Failed to initialize the TTS model")?;
    let tts = TtsManager::with_workers(Arc::new(model), config.workers);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let app = router(AppState::new(tts, config));

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT."))?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
