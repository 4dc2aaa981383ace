//! voxbridge - Wake-word voice assistant for local language models
//!
//! Listens for a wake word, records the command that follows, sends the
//! transcript to a local LLM and speaks the reply.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod command;
pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod llm;
pub mod recognizer;
pub mod session;
#[cfg(feature = "cli")]
pub mod shell;
pub mod speech;

// Core traits (source → recognize → respond → speak)
pub use audio::AudioSource;
pub use llm::LlmClient;
pub use recognizer::{Recognizer, RecognizerLoader};
pub use speech::{CommandExecutor, SpeechSynthesizer};

// Session
pub use command::CommandHandler;
pub use events::{Announcer, ShellEvent};
pub use session::{CaptureLoop, ListenState, Listener, SessionContext, SessionSettings};

// Error handling
pub use error::{Result, VoxbridgeError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash, as shown by
/// `voxbridge --version`.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> &'static str {
    env!("VOXBRIDGE_VERSION")
}
