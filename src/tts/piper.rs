use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{SynthesisResult, Synthesizer, VoiceModel};
use crate::audio::{wav_tempfile, WavInfo};
use crate::error::AppError;

/// Runs the `piper` command line tool once per request.
#[derive(Debug, Clone)]
pub struct PiperProcess {
    piper_bin: PathBuf,
    timeout: Duration,
}

impl PiperProcess {
    pub fn new(piper_bin: PathBuf, timeout: Duration) -> Self {
        Self { piper_bin, timeout }
    }

    async fn run(&self, text: &str, voice: &VoiceModel) -> Result<SynthesisResult, AppError> {
        // Deleted on drop, whichever way we leave this function
        let output = wav_tempfile()?;

        let mut cmd = Command::new(&self.piper_bin);
        cmd.arg("--model")
            .arg(&voice.model_path)
            .arg("--config")
            .arg(&voice.config_path)
            .arg("--output_file")
            .arg(output.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            AppError::Engine(format!(
                "Failed to run {} (is it installed?): {}",
                self.piper_bin.display(),
                e
            ))
        })?;

        let invocation = async {
            if let Some(mut stdin) = child.stdin.take() {
                // An engine that exits early closes its end; its exit status says why
                match stdin.write_all(text.as_bytes()).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
            }
            child.wait_with_output().await
        };

        let finished = tokio::time::timeout(self.timeout, invocation)
            .await
            .map_err(|_| {
                tracing::error!(
                    voice = %voice.id,
                    "piper exceeded {}s, killing it",
                    self.timeout.as_secs()
                );
                AppError::Timeout
            })??;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(AppError::Engine(format!("Piper failed: {}", stderr)));
        }

        let audio = tokio::fs::read(output.path()).await?;
        if audio.is_empty() {
            return Err(AppError::Engine("Piper produced no audio".to_string()));
        }
        let info = WavInfo::from_bytes(&audio)?;

        Ok(SynthesisResult {
            audio,
            sample_rate: info.sample_rate,
            channels: info.channels,
            duration: info.duration,
        })
    }
}

#[async_trait]
impl Synthesizer for PiperProcess {
    async fn synthesize(&self, text: &str, voice: &VoiceModel) -> Result<SynthesisResult, AppError> {
        let started = std::time::Instant::now();
        let result = self.run(text, voice).await?;
        tracing::info!(
            voice = %voice.id,
            chars = text.chars().count(),
            duration = result.duration,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "piper synthesis complete"
        );
        Ok(result)
    }

    async fn is_available(&self, timeout: Duration) -> bool {
        let mut cmd = Command::new(&self.piper_bin);
        cmd.arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout, cmd.status()).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                tracing::debug!("piper probe failed: {}", e);
                false
            }
            Err(_) => {
                tracing::warn!("piper probe timed out after {}s", timeout.as_secs());
                false
            }
        }
    }
}
