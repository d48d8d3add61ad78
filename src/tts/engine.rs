//! Once-initialized in-process speech engine.
//!
//! Loading the model is slow and may involve downloading assets, so it is
//! deferred to the first request. The outcome of that single attempt is
//! shared with every caller, concurrent or later.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::AppError;

/// Raw mono samples straight out of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Synthesized {
    /// Seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }
}

/// A loaded model. Calls are blocking and may run on any thread.
pub trait SpeechModel: Send + Sync {
    fn create(&self, text: &str, voice: &str, speed: f32) -> Result<Synthesized, AppError>;
}

#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn SpeechModel>, AppError>;
}

pub struct LazyEngine {
    loader: Arc<dyn EngineLoader>,
    cell: OnceCell<Result<Arc<dyn SpeechModel>, String>>,
}

impl LazyEngine {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn SpeechModel>, AppError> {
        let outcome = self
            .cell
            .get_or_init(|| async {
                tracing::info!("Loading speech model (first request)...");
                match self.loader.load().await {
                    Ok(model) => {
                        tracing::info!("Speech model loaded successfully");
                        Ok(model)
                    }
                    Err(e) => {
                        tracing::error!("Failed to load speech model: {}", e);
                        Err(e.to_string())
                    }
                }
            })
            .await;

        outcome.clone().map_err(AppError::Engine)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.cell.get(), Some(Ok(_)))
    }
}
