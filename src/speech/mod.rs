//! Spoken output: a synthesizer trait, the system-command synthesizer, and
//! the single-worker FIFO that serializes playback.

pub mod executor;
pub mod queue;

pub use executor::{CommandExecutor, MockCommandExecutor, SystemCommandExecutor};
pub use queue::SpeechQueue;

use crate::config::SpeechConfig;
use crate::defaults::SPEECH_TEXT_PLACEHOLDER;
use crate::error::{Result, VoxbridgeError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Renders text as audible speech, returning once playback has finished.
pub trait SpeechSynthesizer: Send {
    fn speak(&self, text: &str) -> Result<()>;
}

/// Speaks by running an external program (espeak-ng by default).
///
/// Arguments containing `{text}` have it replaced by the utterance; when no
/// argument does, the utterance is appended as the last argument.
pub struct CommandSynthesizer<E: CommandExecutor> {
    executor: E,
    program: String,
    args: Vec<String>,
}

impl<E: CommandExecutor> CommandSynthesizer<E> {
    pub fn new(executor: E, config: &SpeechConfig) -> Self {
        Self {
            executor,
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    fn arguments(&self, text: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(SPEECH_TEXT_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(SPEECH_TEXT_PLACEHOLDER, text)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(text.to_string());
        }
        args
    }
}

impl CommandSynthesizer<SystemCommandExecutor> {
    /// Synthesizer running the configured program on this system.
    pub fn system(config: &SpeechConfig) -> Self {
        Self::new(SystemCommandExecutor::new(), config)
    }
}

impl<E: CommandExecutor> SpeechSynthesizer for CommandSynthesizer<E> {
    fn speak(&self, text: &str) -> Result<()> {
        let args = self.arguments(text);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.executor.execute(&self.program, &args)?;
        Ok(())
    }
}

/// One utterance as seen by a [`RecordingSynthesizer`].
#[derive(Debug, Clone)]
pub struct SpokenUtterance {
    pub text: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Test synthesizer that records what it spoke and when.
///
/// Each utterance takes `duration` of wall time; texts listed with
/// [`RecordingSynthesizer::failing_on`] return an error instead.
#[derive(Debug, Clone, Default)]
pub struct RecordingSynthesizer {
    spoken: Arc<Mutex<Vec<SpokenUtterance>>>,
    duration: Duration,
    failing: Vec<String>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.push(text.to_string());
        self
    }

    /// Texts spoken so far, in playback order
    pub fn texts(&self) -> Vec<String> {
        self.utterances().into_iter().map(|u| u.text).collect()
    }

    pub fn utterances(&self) -> Vec<SpokenUtterance> {
        self.spoken
            .lock()
            .map(|spoken| spoken.clone())
            .unwrap_or_default()
    }
}

impl SpeechSynthesizer for RecordingSynthesizer {
    fn speak(&self, text: &str) -> Result<()> {
        if self.failing.iter().any(|f| f == text) {
            return Err(VoxbridgeError::SpeechFailed {
                message: format!("cannot render '{text}'"),
            });
        }

        let started = Instant::now();
        if !self.duration.is_zero() {
            std::thread::sleep(self.duration);
        }
        if let Ok(mut spoken) = self.spoken.lock() {
            spoken.push(SpokenUtterance {
                text: text.to_string(),
                started,
                finished: Instant::now(),
            });
        }
        Ok(())
    }
}
