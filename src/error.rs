//! Error types for voxbridge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxbridgeError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio stream closed")]
    AudioStreamClosed,

    // Recognizer errors
    #[error("Recognizer model not found at {path}")]
    RecognizerModelNotFound { path: String },

    #[error("Failed to initialize recognizer: {message}")]
    RecognizerInit { message: String },

    #[error("Recognition failed: {message}")]
    Recognition { message: String },

    // Language model errors
    #[error("LLM returned HTTP {status}: {body}")]
    LlmStatus { status: u16, body: String },

    #[error("LLM request failed: {message}")]
    LlmRequest { message: String },

    #[error("Invalid LLM response: {message}")]
    LlmResponse { message: String },

    // Speech output errors
    #[error("Speech tool not found: {tool}")]
    SpeechToolNotFound { tool: String },

    #[error("Speech synthesis failed: {message}")]
    SpeechFailed { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for VoxbridgeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => VoxbridgeError::LlmStatus {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => VoxbridgeError::LlmRequest {
                message: err.to_string(),
            },
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxbridgeError>;
