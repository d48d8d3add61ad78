pub mod handlers;
pub mod routes;
pub mod synthesize;

use serde::{Deserialize, Serialize};

use crate::tts::VoiceEntry;

pub const TEST_TEXT: &str = "Hello, this is a test of the Piper text to speech system.";

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestParams {
    pub text: Option<String>,
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<VoiceEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Degraded,
}

impl HealthState {
    pub fn evaluate(engine_available: bool, voices_count: usize) -> Self {
        if engine_available && voices_count > 0 {
            HealthState::Ok
        } else {
            HealthState::Degraded
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthState,
    pub piper_available: bool,
    pub voices_count: usize,
    pub voices_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SynthesizeFileResponse {
    pub success: bool,
    pub output_path: String,
    pub sample_rate: u32,
    pub duration: f64,
}

#[derive(Debug, Serialize)]
pub struct EngineHealthResponse {
    pub status: &'static str,
    pub engine: &'static str,
}
