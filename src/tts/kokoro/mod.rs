pub mod assets;
pub mod tokenizer;
pub mod voices;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;

use super::engine::{EngineLoader, SpeechModel, Synthesized};
use crate::error::AppError;

pub use assets::KokoroAssets;
pub use voices::VoiceBank;

pub const SAMPLE_RATE: u32 = 24000;

/// Kokoro v1.0 running in-process on ONNX Runtime.
pub struct KokoroModel {
    session: Mutex<Session>,
    voices: VoiceBank,
    espeak_bin: PathBuf,
}

impl KokoroModel {
    pub fn load(assets: &KokoroAssets, espeak_bin: PathBuf) -> Result<Self, AppError> {
        let session = Session::builder()
            .map_err(|e| AppError::Engine(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| AppError::Engine(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(4)
            .map_err(|e| AppError::Engine(format!("Failed to set threads: {}", e)))?
            .commit_from_file(assets.model_path())
            .map_err(|e| AppError::Engine(format!("Failed to load model: {}", e)))?;

        let voices = VoiceBank::from_npz(BufReader::new(File::open(assets.voices_path())?))?;
        tracing::info!("Kokoro voice bank holds {} voices", voices.len());

        Ok(Self {
            session: Mutex::new(session),
            voices,
            espeak_bin,
        })
    }

    fn infer(&self, tokens: &[i64], style: Vec<f32>, speed: f32) -> Result<Vec<f32>, AppError> {
        // Pad both ends with the boundary token
        let mut ids = Vec::with_capacity(tokens.len() + 2);
        ids.push(0);
        ids.extend_from_slice(tokens);
        ids.push(0);

        let tokens_value = Value::from_array((vec![1, ids.len()], ids))
            .map_err(|e| AppError::Engine(format!("Failed to create tokens tensor: {}", e)))?;
        let style_value = Value::from_array((vec![1, style.len()], style))
            .map_err(|e| AppError::Engine(format!("Failed to create style tensor: {}", e)))?;
        let speed_value = Value::from_array((vec![1], vec![speed]))
            .map_err(|e| AppError::Engine(format!("Failed to create speed tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| AppError::Engine("Kokoro session poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![tokens_value, style_value, speed_value])
            .map_err(|e| AppError::Engine(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get("waveform")
            .or_else(|| outputs.get("audio"))
            .ok_or_else(|| AppError::Engine("Missing output tensor".to_string()))?;

        let (_, samples) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| AppError::Engine(format!("Failed to extract output tensor: {}", e)))?;

        Ok(samples.to_vec())
    }
}

impl SpeechModel for KokoroModel {
    fn create(&self, text: &str, voice: &str, speed: f32) -> Result<Synthesized, AppError> {
        if !self.voices.contains(voice) {
            return Err(AppError::Engine(format!("Voice {} not found in voice bank", voice)));
        }

        let language = tokenizer::language_for_voice(voice);
        let phonemes = tokenizer::phonemize(&self.espeak_bin, text, language)?;
        let tokens = tokenizer::tokenize(&phonemes);

        let mut samples = Vec::new();
        for chunk in tokenizer::chunk_tokens(&tokens) {
            let style = self
                .voices
                .style(voice, chunk.len())
                .ok_or_else(|| AppError::Engine(format!("Voice {} has no styles", voice)))?
                .to_vec();
            samples.extend(self.infer(chunk, style, speed)?);
        }

        Ok(Synthesized {
            samples,
            sample_rate: SAMPLE_RATE,
        })
    }
}

/// Fetches missing assets, then builds the ONNX session off the async runtime.
pub struct KokoroLoader {
    assets: KokoroAssets,
    espeak_bin: PathBuf,
}

impl KokoroLoader {
    pub fn new(assets: KokoroAssets, espeak_bin: PathBuf) -> Self {
        Self { assets, espeak_bin }
    }
}

#[async_trait]
impl EngineLoader for KokoroLoader {
    async fn load(&self) -> Result<Arc<dyn SpeechModel>, AppError> {
        self.assets.ensure().await?;

        let assets = self.assets.clone();
        let espeak_bin = self.espeak_bin.clone();
        let model = tokio::task::spawn_blocking(move || KokoroModel::load(&assets, espeak_bin))
            .await
            .map_err(|e| AppError::Engine(format!("Model loading task failed: {}", e)))??;

        Ok(Arc::new(model))
    }
}
