use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pbx_tts_server::api::routes::{create_kokoro_router, KokoroState};
use pbx_tts_server::config::KokoroServerConfig;
use pbx_tts_server::tts::kokoro::{KokoroAssets, KokoroLoader};
use pbx_tts_server::tts::LazyEngine;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match KokoroServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    let addr = match config.addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };

    let loader = KokoroLoader::new(
        KokoroAssets::new(config.assets_dir.clone()),
        config.espeak_bin.clone(),
    );
    let state = Arc::new(KokoroState {
        engine: LazyEngine::new(Arc::new(loader)),
        default_voice: config.default_voice.clone(),
        synth_timeout: config.synth_timeout,
    });

    tracing::info!("Kokoro TTS server starting on http://{}", addr);
    tracing::info!("Assets directory: {}", config.assets_dir.display());
    tracing::info!("Model will be loaded on first request...");

    let app = create_kokoro_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await
        .expect("Server error");
}
