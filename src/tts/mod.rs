pub mod engine;
pub mod kokoro;
pub mod piper;
pub mod voice;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;

pub use engine::{EngineLoader, LazyEngine, SpeechModel, Synthesized};
pub use piper::PiperProcess;
pub use voice::{Gender, VoiceCatalog, VoiceEntry, VoiceMetadata, VoiceModel};

/// Audio produced for a single request.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub audio: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Seconds.
    pub duration: f64,
}

/// Something that turns text into WAV audio for an installed voice.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceModel) -> Result<SynthesisResult, AppError>;

    /// Whether the engine looks usable. Must return within `timeout`.
    async fn is_available(&self, timeout: Duration) -> bool;
}
