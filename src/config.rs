use crate::defaults;
use crate::error::{Result, VoxbridgeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub assistant: AssistantConfig,
    pub llm: LlmConfig,
    pub speech: SpeechConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub block_size: usize,
}

/// Wake word and command window configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    pub wake_word: String,
    pub command_timeout_ms: u64,
    pub model_path: PathBuf,
}

/// Local language model endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Speech output configuration
///
/// `args` may contain `{text}`, which is replaced by the utterance. When no
/// argument contains it, the utterance is appended as the last argument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            block_size: defaults::BLOCK_SIZE,
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            wake_word: defaults::WAKE_WORD.to_string(),
            command_timeout_ms: defaults::COMMAND_TIMEOUT_MS,
            model_path: PathBuf::from(defaults::MODEL_PATH),
        }
    }
}

impl AssistantConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::LLM_ENDPOINT.to_string(),
            model: defaults::LLM_MODEL.to_string(),
            timeout_secs: defaults::LLM_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: defaults::SPEECH_PROGRAM.to_string(),
            args: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VoxbridgeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(VoxbridgeError::ConfigParse {
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxbridge/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxbridge")
            .join("config.toml")
    }

    /// Reject values the capture loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.assistant.wake_word.trim().is_empty() {
            return Err(invalid("assistant.wake_word", "must not be empty"));
        }
        if self.assistant.command_timeout_ms == 0 {
            return Err(invalid("assistant.command_timeout_ms", "must be positive"));
        }
        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }
        if self.audio.block_size == 0 {
            return Err(invalid("audio.block_size", "must be positive"));
        }
        if self.llm.endpoint.trim().is_empty() {
            return Err(invalid("llm.endpoint", "must not be empty"));
        }
        if self.speech.program.trim().is_empty() {
            return Err(invalid("speech.program", "must not be empty"));
        }
        Ok(())
    }

    /// Serialize to TOML, as written by `voxbridge config dump`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VoxbridgeError::ConfigParse {
            message: e.to_string(),
        })
    }
}

fn invalid(key: &str, message: &str) -> VoxbridgeError {
    VoxbridgeError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
