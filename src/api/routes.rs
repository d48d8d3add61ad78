use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, synthesize};
use crate::audio::Resampler;
use crate::tts::{LazyEngine, Synthesizer, VoiceCatalog};

/// State for the Piper server.
pub struct AppState {
    pub catalog: VoiceCatalog,
    pub synthesizer: Arc<dyn Synthesizer>,
    /// Present when responses must be converted to telephony format.
    pub resampler: Option<Resampler>,
    pub default_voice: String,
    pub probe_timeout: std::time::Duration,
}

/// State for the Kokoro server.
pub struct KokoroState {
    pub engine: LazyEngine,
    pub default_voice: String,
    pub synth_timeout: std::time::Duration,
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate", post(handlers::generate))
        .route("/voices", get(handlers::list_voices))
        .route("/health", get(handlers::health))
        .route("/test", get(handlers::test))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn create_kokoro_router(state: Arc<KokoroState>) -> Router {
    Router::new()
        .route(
            "/health",
            get(synthesize::health).fallback(synthesize::not_found),
        )
        .route(
            "/synthesize",
            post(synthesize::synthesize).fallback(synthesize::not_found),
        )
        .fallback(synthesize::not_found)
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
