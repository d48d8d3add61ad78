use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::path::Path;
use std::sync::Arc;

use super::{EngineHealthResponse, SynthesizeFileResponse, SynthesizeRequest};
use crate::api::routes::KokoroState;
use crate::audio::{samples_to_wav, write_wav_file};
use crate::error::AppError;

const SPEED: f32 = 1.0;

pub async fn health() -> Json<EngineHealthResponse> {
    Json(EngineHealthResponse {
        status: "ok",
        engine: "kokoro",
    })
}

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub async fn synthesize(
    State(state): State<Arc<KokoroState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: SynthesizeRequest = serde_json::from_slice(&body)?;

    let text = request
        .text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if text.is_empty() {
        return Err(AppError::InvalidInput("No text provided".into()));
    }
    let voice = request
        .voice
        .unwrap_or_else(|| state.default_voice.clone());

    let preview: String = text.chars().take(50).collect();
    tracing::info!("Synthesizing: '{}...' with voice '{}'", preview, voice);

    let model = state.engine.get().await?;
    let job = tokio::task::spawn_blocking(move || model.create(&text, &voice, SPEED));
    let synthesized = tokio::time::timeout(state.synth_timeout, job)
        .await
        .map_err(|_| AppError::Timeout)?
        .map_err(|e| AppError::Engine(format!("Synthesis task failed: {}", e)))??;

    let wav = samples_to_wav(&synthesized.samples, synthesized.sample_rate)?;

    if let Some(output_path) = request.output_path {
        write_wav_file(Path::new(&output_path), &wav).await?;
        tracing::info!("Audio saved to {}", output_path);

        return Ok(Json(SynthesizeFileResponse {
            success: true,
            output_path,
            sample_rate: synthesized.sample_rate,
            duration: synthesized.duration(),
        })
        .into_response());
    }

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (header::CONTENT_LENGTH, wav.len().to_string()),
        ],
        wav,
    )
        .into_response())
}
