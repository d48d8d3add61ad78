use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::{
    GenerateRequest, HealthResponse, HealthState, TestParams, VoicesResponse, TEST_TEXT,
};
use crate::api::routes::AppState;
use crate::error::AppError;

pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<GenerateRequest>>,
) -> Result<Response, AppError> {
    let Some(Json(request)) = payload else {
        return Err(AppError::InvalidInput("No JSON data provided".into()));
    };

    speak(
        &state,
        request.text.as_deref().unwrap_or_default(),
        request.voice.as_deref(),
    )
    .await
}

/// Smoke-test endpoint: `/generate` driven by query parameters.
pub async fn test(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TestParams>,
) -> Result<Response, AppError> {
    let text = params.text.as_deref().unwrap_or(TEST_TEXT);
    speak(&state, text, params.voice.as_deref()).await
}

async fn speak(state: &AppState, text: &str, voice: Option<&str>) -> Result<Response, AppError> {
    // Validate input
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::InvalidInput("No text provided".into()));
    }

    let voice_id = voice.unwrap_or(state.default_voice.as_str());
    let voice = state.catalog.resolve(voice_id)?;

    // Generate audio
    let result = state.synthesizer.synthesize(text, &voice).await?;

    let audio = match &state.resampler {
        Some(resampler) => {
            let resampled = resampler.to_telephony(result.audio).await;
            tracing::debug!(voice = %voice.id, processed = resampled.is_processed(), "post-processing done");
            resampled.into_bytes()
        }
        None => result.audio,
    };

    // Return audio response
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"output.wav\""),
        ],
        audio,
    )
        .into_response())
}

pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: state.catalog.list_voices(),
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let piper_available = tokio::time::timeout(
        state.probe_timeout,
        state.synthesizer.is_available(state.probe_timeout),
    )
    .await
    .unwrap_or(false);
    let voices_count = state.catalog.count_models();

    Json(HealthResponse {
        status: HealthState::evaluate(piper_available, voices_count),
        piper_available,
        voices_count,
        voices_dir: state.catalog.voices_dir().display().to_string(),
    })
}
