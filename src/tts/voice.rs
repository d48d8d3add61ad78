use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::AppError;

pub const MODEL_EXTENSION: &str = "onnx";
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;
pub const DEFAULT_LANGUAGE_CODE: &str = "en";

const FALLBACK_LANGUAGE: &str = "en_US";
const FALLBACK_QUALITY: &str = "medium";

/// Speaker name fragments associated with female voices.
const FEMALE_NAMES: &[&str] = &[
    "lessac", "amy", "kristin", "kathleen", "alba", "cori", "jenny", "female",
];

/// Speaker name fragments associated with male voices.
const MALE_NAMES: &[&str] = &["ryan", "joe", "alan", "aru", "kusal", "arctic", "male"];

/// The subset of a Piper `<voice>.onnx.json` sidecar we care about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub language: LanguageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageConfig {
    #[serde(default = "default_language_code")]
    pub code: String,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_language_code() -> String {
    DEFAULT_LANGUAGE_CODE.to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            code: default_language_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceMetadata {
    pub sample_rate: u32,
    pub language: String,
}

impl VoiceMetadata {
    /// Reads the sidecar for a model. Never fails: a missing or broken
    /// sidecar yields the defaults.
    pub fn read(config_path: &Path) -> Self {
        let config = match File::open(config_path) {
            Ok(file) => match serde_json::from_reader::<_, VoiceConfig>(file) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Unreadable voice sidecar {}: {}", config_path.display(), e);
                    VoiceConfig::default()
                }
            },
            Err(_) => VoiceConfig::default(),
        };

        Self {
            sample_rate: config.audio.sample_rate,
            language: config.language.code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Unknown,
}

impl Gender {
    fn symbol(self) -> Option<char> {
        match self {
            Gender::Female => Some('F'),
            Gender::Male => Some('M'),
            Gender::Unknown => None,
        }
    }
}

/// Guess a speaker's gender from its name. Female fragments are checked
/// first, so "female" never reads as "male".
pub fn infer_gender(speaker: &str) -> Gender {
    let speaker = speaker.to_lowercase();
    if FEMALE_NAMES.iter().any(|name| speaker.contains(name)) {
        Gender::Female
    } else if MALE_NAMES.iter().any(|name| speaker.contains(name)) {
        Gender::Male
    } else {
        Gender::Unknown
    }
}

/// Attributes derived purely from a voice id such as `en_GB-alba-medium`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTraits {
    pub language: String,
    pub speaker: String,
    pub quality: String,
    pub gender: Gender,
}

impl VoiceTraits {
    pub fn parse(id: &str) -> Self {
        // Pattern: language-speaker-quality
        let parts: Vec<&str> = id.split('-').collect();
        let (language, speaker, quality) = if parts.len() >= 3 {
            (parts[0], parts[1], parts[2])
        } else {
            (FALLBACK_LANGUAGE, id, FALLBACK_QUALITY)
        };

        Self {
            language: language.to_string(),
            speaker: speaker.to_string(),
            quality: quality.to_string(),
            gender: infer_gender(speaker),
        }
    }

    pub fn display_name(&self) -> String {
        let name = title_case(&self.speaker.replace('_', " "));
        match self.gender.symbol() {
            Some(symbol) => format!("{} ({} {})", name, self.language, symbol),
            None => format!("{} ({})", name, self.language),
        }
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_word = false;
    for ch in input.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceEntry {
    pub id: String,
    pub name: String,
    pub language: String,
    pub gender: Gender,
    pub quality: String,
    pub sample_rate: u32,
}

impl VoiceEntry {
    pub fn new(id: &str, metadata: &VoiceMetadata) -> Self {
        let traits = VoiceTraits::parse(id);
        Self {
            id: id.to_string(),
            name: traits.display_name(),
            language: traits.language,
            gender: traits.gender,
            quality: traits.quality,
            sample_rate: metadata.sample_rate,
        }
    }
}

/// An installed voice resolved to its files on disk.
#[derive(Debug, Clone)]
pub struct VoiceModel {
    pub id: String,
    pub model_path: PathBuf,
    pub config_path: PathBuf,
    pub metadata: VoiceMetadata,
}

/// Read-only view over a directory of Piper voice models.
#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    voices_dir: PathBuf,
}

impl VoiceCatalog {
    pub fn new(voices_dir: PathBuf) -> Self {
        Self { voices_dir }
    }

    pub fn voices_dir(&self) -> &Path {
        &self.voices_dir
    }

    fn model_path(&self, voice_id: &str) -> PathBuf {
        self.voices_dir
            .join(format!("{}.{}", voice_id, MODEL_EXTENSION))
    }

    fn config_path(&self, voice_id: &str) -> PathBuf {
        self.voices_dir
            .join(format!("{}.{}.json", voice_id, MODEL_EXTENSION))
    }

    /// Voice ids of every installed model, in filename order. A missing or
    /// unreadable directory is an empty catalog.
    pub fn voice_ids(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.voices_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut file_names: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        // Sorted by file name; ids map one-to-one onto file names
        file_names.sort();

        let mut ids: Vec<String> = Vec::new();
        for file_name in file_names {
            let Some(id) = file_name
                .strip_suffix(MODEL_EXTENSION)
                .and_then(|stem| stem.strip_suffix('.'))
            else {
                continue;
            };
            if id.is_empty() {
                continue;
            }
            ids.push(id.to_string());
        }
        ids
    }

    pub fn count_models(&self) -> usize {
        self.voice_ids().len()
    }

    pub fn voice_metadata(&self) -> BTreeMap<String, VoiceMetadata> {
        self.voice_ids()
            .into_iter()
            .map(|id| {
                let metadata = VoiceMetadata::read(&self.config_path(&id));
                (id, metadata)
            })
            .collect()
    }

    pub fn list_voices(&self) -> Vec<VoiceEntry> {
        self.voice_ids()
            .iter()
            .map(|id| VoiceEntry::new(id, &VoiceMetadata::read(&self.config_path(id))))
            .collect()
    }

    pub fn resolve(&self, voice_id: &str) -> Result<VoiceModel, AppError> {
        if voice_id.is_empty()
            || voice_id.contains("..")
            || voice_id.contains('/')
            || voice_id.contains('\\')
        {
            return Err(AppError::VoiceNotFound(voice_id.to_string()));
        }

        let model_path = self.model_path(voice_id);
        if !model_path.is_file() {
            return Err(AppError::VoiceNotFound(voice_id.to_string()));
        }

        let config_path = self.config_path(voice_id);
        let metadata = VoiceMetadata::read(&config_path);

        Ok(VoiceModel {
            id: voice_id.to_string(),
            model_path,
            config_path,
            metadata,
        })
    }
}
