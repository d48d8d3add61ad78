use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid listen address: {0}")]
    Address(String),
}

pub const DEFAULT_PIPER_VOICE: &str = "en_US-lessac-medium";
pub const DEFAULT_KOKORO_VOICE: &str = "af_heart";

/// Settings for the Piper server (catalog, synthesis, health).
#[derive(Debug, Clone)]
pub struct PiperServerConfig {
    pub host: String,
    pub port: u16,
    pub voices_dir: PathBuf,
    pub default_voice: String,
    pub piper_bin: PathBuf,
    pub sox_bin: PathBuf,
    /// Convert output to 8kHz mono before responding.
    pub telephony_output: bool,
    pub synth_timeout: Duration,
    pub resample_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Default for PiperServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5050,
            voices_dir: PathBuf::from("./voices"),
            default_voice: DEFAULT_PIPER_VOICE.to_string(),
            piper_bin: PathBuf::from("piper"),
            sox_bin: PathBuf::from("sox"),
            telephony_output: true,
            synth_timeout: Duration::from_secs(30),
            resample_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl PiperServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: env_or("HOST", defaults.host),
            port: env_parse("PORT", defaults.port)?,
            voices_dir: env_or("VOICES_DIR", defaults.voices_dir),
            default_voice: env_or("DEFAULT_VOICE", defaults.default_voice),
            piper_bin: env_or("PIPER_BIN", defaults.piper_bin),
            sox_bin: env_or("SOX_BIN", defaults.sox_bin),
            telephony_output: env_parse("TELEPHONY_OUTPUT", defaults.telephony_output)?,
            synth_timeout: Duration::from_secs(env_parse(
                "PIPER_TIMEOUT_SECS",
                defaults.synth_timeout.as_secs(),
            )?),
            ..defaults
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.port)
    }
}

/// Settings for the Kokoro server (in-process synthesis).
#[derive(Debug, Clone)]
pub struct KokoroServerConfig {
    pub host: String,
    pub port: u16,
    /// Where `kokoro-v1.0.onnx` and `voices-v1.0.bin` live (or get downloaded to).
    pub assets_dir: PathBuf,
    pub default_voice: String,
    pub espeak_bin: PathBuf,
    pub synth_timeout: Duration,
}

impl Default for KokoroServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5003,
            assets_dir: executable_dir(),
            default_voice: DEFAULT_KOKORO_VOICE.to_string(),
            espeak_bin: PathBuf::from("espeak-ng"),
            synth_timeout: Duration::from_secs(120),
        }
    }
}

impl KokoroServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: env_or("HOST", defaults.host),
            port: env_parse("KOKORO_PORT", defaults.port)?,
            assets_dir: env_or("KOKORO_ASSETS_DIR", defaults.assets_dir),
            default_voice: env_or("KOKORO_DEFAULT_VOICE", defaults.default_voice),
            espeak_bin: env_or("ESPEAK_BIN", defaults.espeak_bin),
            synth_timeout: Duration::from_secs(env_parse(
                "KOKORO_TIMEOUT_SECS",
                defaults.synth_timeout.as_secs(),
            )?),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr(&self.host, self.port)
    }
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    format!("{}:{}", host, port)
        .parse()
        .map_err(|_| ConfigError::Address(format!("{}:{}", host, port)))
}

fn env_or<T: From<String>>(key: &str, default: T) -> T {
    std::env::var(key).map(T::from).unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_piper_defaults() {
        let config = PiperServerConfig::default();
        assert_eq!(config.port, 5050);
        assert_eq!(config.default_voice, "en_US-lessac-medium");
        assert_eq!(config.synth_timeout, Duration::from_secs(30));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(config.telephony_output);
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:5050");
    }

    #[test]
    fn test_kokoro_defaults() {
        let config = KokoroServerConfig::default();
        assert_eq!(config.port, 5003);
        assert_eq!(config.default_voice, "af_heart");
    }

    #[test]
    fn test_bad_address() {
        assert!(socket_addr("not a host", 80).is_err());
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        std::env::set_var("PBX_TTS_TEST_PORT", "fifty");
        let result: Result<u16, _> = env_parse("PBX_TTS_TEST_PORT", 1);
        assert!(matches!(result, Err(ConfigError::Invalid { key: "PBX_TTS_TEST_PORT", .. })));
        std::env::remove_var("PBX_TTS_TEST_PORT");
    }
}
