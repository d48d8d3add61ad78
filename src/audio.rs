use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tokio::process::Command;

use crate::error::AppError;

/// 8kHz mono, what the PBX side expects.
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;
pub const TELEPHONY_CHANNELS: u16 = 1;

/// Format facts read back from a WAV header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: f64,
}

impl WavInfo {
    pub fn from_bytes(wav: &[u8]) -> Result<Self, AppError> {
        let reader = WavReader::new(Cursor::new(wav))
            .map_err(|e| AppError::Engine(format!("Unreadable WAV audio: {}", e)))?;
        let spec = reader.spec();
        // duration() counts frames, not interleaved samples
        let frames = reader.duration() as f64;

        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            duration: frames / spec.sample_rate.max(1) as f64,
        })
    }
}

/// Convert mono f32 samples in [-1.0, 1.0] to a 16-bit PCM WAV
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AppError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Vec::new();
    {
        let cursor = Cursor::new(&mut buffer);
        let mut writer = WavWriter::new(cursor, spec)
            .map_err(|e| AppError::Engine(format!("Failed to create WAV writer: {}", e)))?;

        for sample in samples {
            let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(scaled)
                .map_err(|e| AppError::Engine(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| AppError::Engine(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(buffer)
}

/// Outcome of a best-effort resample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resampled {
    /// The resampler produced new audio.
    Processed(Vec<u8>),
    /// The resampler failed; these are the original bytes, untouched.
    Passthrough(Vec<u8>),
}

impl Resampled {
    pub fn is_processed(&self) -> bool {
        matches!(self, Resampled::Processed(_))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Resampled::Processed(bytes) | Resampled::Passthrough(bytes) => bytes,
        }
    }
}

/// Resamples WAV audio through an external `sox` binary.
#[derive(Debug, Clone)]
pub struct Resampler {
    sox_bin: PathBuf,
    timeout: Duration,
}

impl Resampler {
    pub fn new(sox_bin: PathBuf, timeout: Duration) -> Self {
        Self { sox_bin, timeout }
    }

    pub async fn to_telephony(&self, audio: Vec<u8>) -> Resampled {
        self.resample(audio, TELEPHONY_SAMPLE_RATE, TELEPHONY_CHANNELS)
            .await
    }

    /// Never fails. Any problem along the way hands back the input.
    pub async fn resample(&self, audio: Vec<u8>, target_rate: u32, target_channels: u16) -> Resampled {
        match self.run_sox(&audio, target_rate, target_channels).await {
            Ok(converted) => Resampled::Processed(converted),
            Err(e) => {
                tracing::warn!("Resampling failed, returning original audio: {}", e);
                Resampled::Passthrough(audio)
            }
        }
    }

    async fn run_sox(&self, audio: &[u8], target_rate: u32, target_channels: u16) -> Result<Vec<u8>, AppError> {
        // Both files are removed when they go out of scope
        let input = wav_tempfile()?;
        let output = wav_tempfile()?;
        tokio::fs::write(input.path(), audio).await?;

        let mut cmd = Command::new(&self.sox_bin);
        cmd.arg(input.path())
            .arg("-r")
            .arg(target_rate.to_string())
            .arg("-c")
            .arg(target_channels.to_string())
            .arg(output.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AppError::Timeout)??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(AppError::Engine(format!("sox failed: {}", stderr.trim())));
        }

        let converted = tokio::fs::read(output.path()).await?;
        if converted.is_empty() {
            return Err(AppError::Engine("sox produced no audio".to_string()));
        }
        Ok(converted)
    }
}

pub(crate) fn wav_tempfile() -> Result<tempfile::NamedTempFile, AppError> {
    Ok(tempfile::Builder::new()
        .prefix("pbx-tts-")
        .suffix(".wav")
        .tempfile()?)
}

/// Write a WAV to an explicit destination chosen by the caller.
pub async fn write_wav_file(path: &Path, wav: &[u8]) -> Result<(), AppError> {
    tokio::fs::write(path, wav).await?;
    Ok(())
}
