use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pbx_tts_server::api::routes::{create_router, AppState};
use pbx_tts_server::audio::Resampler;
use pbx_tts_server::config::PiperServerConfig;
use pbx_tts_server::tts::{PiperProcess, VoiceCatalog};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Configuration from environment
    let config = match PiperServerConfig::from_env() {
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

    tracing::info!("Piper TTS Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Voices directory: {}", config.voices_dir.display());

    let catalog = VoiceCatalog::new(config.voices_dir.clone());
    if config.voices_dir.is_dir() {
        tracing::info!("Found {} voice models", catalog.count_models());
    } else {
        tracing::warn!("Voices directory does not exist");
    }

    let resampler = config
        .telephony_output
        .then(|| Resampler::new(config.sox_bin.clone(), config.resample_timeout));

    // Create app state
    let state = Arc::new(AppState {
        catalog,
        synthesizer: Arc::new(PiperProcess::new(
            config.piper_bin.clone(),
            config.synth_timeout,
        )),
        resampler,
        default_voice: config.default_voice.clone(),
        probe_timeout: config.probe_timeout,
    });

    // Create router
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
