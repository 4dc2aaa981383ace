//! The capture/dispatch loop: wake word detection, the command window, and
//! hand-off of finished commands.

use crate::audio::AudioSource;
use crate::clock::Clock;
use crate::command::CommandHandler;
use crate::config::Config;
use crate::defaults::NOT_UNDERSTOOD_NOTICE;
use crate::error::{Result, VoxbridgeError};
use crate::events::Announcer;
use crate::recognizer::{Recognizer, RecognizerLoader};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Where a listening session currently is. A loop goes `Idle` once its
/// session is over and ignores any further audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Idle,
    WaitingForWakeWord,
    InCommandWindow,
}

/// Per-session tunables, taken from the configuration at start.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub wake_word: String,
    pub command_timeout: Duration,
    pub block_size: usize,
    pub sample_rate: u32,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wake_word: config.assistant.wake_word.trim().to_string(),
            command_timeout: config.assistant.command_timeout(),
            block_size: config.audio.block_size,
            sample_rate: config.audio.sample_rate,
        }
    }

    pub fn listening_status(&self) -> String {
        format!("Listening for '{}'...", self.wake_word)
    }

    fn heard_wake_word(&self, partial: &str) -> bool {
        !self.wake_word.is_empty()
            && partial
                .to_lowercase()
                .contains(&self.wake_word.to_lowercase())
    }
}

/// Everything a session needs besides its audio source and clock.
#[derive(Clone)]
pub struct SessionContext {
    pub settings: SessionSettings,
    pub loader: Arc<dyn RecognizerLoader>,
    pub announcer: Announcer,
    pub handler: CommandHandler,
}

/// Block-by-block state machine for one listening session.
pub struct CaptureLoop<C: Clock> {
    settings: SessionSettings,
    recognizer: Box<dyn Recognizer>,
    announcer: Announcer,
    handler: CommandHandler,
    clock: C,
    active: Arc<AtomicBool>,
    state: ListenState,
    last_word_at: Instant,
    command_audio: Vec<Vec<i16>>,
}

impl<C: Clock> CaptureLoop<C> {
    pub fn new(context: &SessionContext, recognizer: Box<dyn Recognizer>, clock: C) -> Self {
        let last_word_at = clock.now();
        Self {
            settings: context.settings.clone(),
            recognizer,
            announcer: context.announcer.clone(),
            handler: context.handler.clone(),
            clock,
            active: Arc::new(AtomicBool::new(true)),
            state: ListenState::WaitingForWakeWord,
            last_word_at,
            command_audio: Vec::new(),
        }
    }

    /// Tie the loop to its session flag. Once the flag is cleared the loop
    /// stops pushing status updates, so a detached thread finishing a slow
    /// LLM call cannot overwrite the shell's `Idle`.
    pub fn with_active(mut self, active: Arc<AtomicBool>) -> Self {
        self.active = active;
        self
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    /// Blocks buffered since the command window opened
    pub fn buffered_blocks(&self) -> usize {
        self.command_audio.len()
    }

    /// Feed one block and advance the state machine.
    pub fn process_block(&mut self, block: &[i16]) -> Result<()> {
        match self.state {
            ListenState::Idle => Ok(()),
            ListenState::WaitingForWakeWord => {
                let feed = self.recognizer.feed(block)?;
                if self.settings.heard_wake_word(&feed.partial) {
                    self.open_command_window();
                }
                Ok(())
            }
            ListenState::InCommandWindow => {
                let feed = self.recognizer.feed(block)?;
                self.command_audio.push(block.to_vec());
                if !feed.partial.is_empty() {
                    self.last_word_at = self.clock.now();
                }

                if feed.is_final {
                    self.close_command_window();
                    let outcome = self
                        .recognizer
                        .final_result()
                        .and_then(|text| self.dispatch(&text));
                    self.resume_listening();
                    outcome
                } else if self.window_expired() {
                    self.finalize_on_timeout()
                } else {
                    Ok(())
                }
            }
        }
    }

    /// End of audio: a command window still open is processed as if it had
    /// timed out, then the loop goes idle.
    pub fn finish(&mut self) -> Result<()> {
        let outcome = match self.state {
            ListenState::InCommandWindow => self.finalize_on_timeout(),
            _ => Ok(()),
        };
        self.state = ListenState::Idle;
        outcome
    }

    /// Stopped from outside: drop an open command window without dispatching it.
    pub fn abandon(&mut self) {
        self.command_audio.clear();
        self.state = ListenState::Idle;
    }

    fn open_command_window(&mut self) {
        self.state = ListenState::InCommandWindow;
        self.command_audio.clear();
        self.last_word_at = self.clock.now();
        self.recognizer.reset();

        tracing::debug!(wake_word = %self.settings.wake_word, "wake word detected");
        self.announcer.status("Speak your query now...");
        self.announcer
            .announce(&format!("'{}' detected.", self.settings.wake_word));
    }

    fn close_command_window(&mut self) {
        self.state = ListenState::WaitingForWakeWord;
        self.command_audio.clear();
    }

    fn window_expired(&self) -> bool {
        self.clock.now().saturating_duration_since(self.last_word_at) > self.settings.command_timeout
    }

    /// Force-feed everything heard in the window and take whatever the
    /// recognizer makes of it.
    fn finalize_on_timeout(&mut self) -> Result<()> {
        self.announcer.note("Timeout reached, processing command...");

        let audio = self.command_audio.concat();
        self.close_command_window();

        let outcome = self.force_finalize(&audio).and_then(|text| {
            if text.trim().is_empty() {
                self.announcer.announce(NOT_UNDERSTOOD_NOTICE);
                Ok(())
            } else {
                self.dispatch(&text)
            }
        });
        self.resume_listening();
        outcome
    }

    fn resume_listening(&self) {
        if self.active.load(Ordering::SeqCst) {
            self.announcer.status(&self.settings.listening_status());
        }
    }

    fn force_finalize(&mut self, audio: &[i16]) -> Result<String> {
        self.recognizer.feed(audio)?;
        self.recognizer.final_result()
    }

    fn dispatch(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.announcer.note(&format!("> Query: {text}"));
        self.handler.handle(text)
    }
}

/// Run one listening session until `active` is cleared or a finite source
/// runs dry.
///
/// The recognizer is opened before the audio source. Failure of either ends
/// the session with an `Initialization Error` message. When the session ends
/// on its own (not through `active` being cleared by the caller) it clears
/// `active` and reports the shell back to idle. A finite source that runs dry
/// inside the command window still gets its query processed.
pub fn run_session<C, F>(
    context: &SessionContext,
    open_source: F,
    clock: C,
    active: &Arc<AtomicBool>,
) where
    C: Clock,
    F: FnOnce() -> Result<Box<dyn AudioSource>>,
{
    let announcer = &context.announcer;

    let recognizer = match context.loader.open(context.settings.sample_rate) {
        Ok(recognizer) => recognizer,
        Err(e) => {
            report_init_failure(context, active, &e);
            return;
        }
    };

    let mut source = match open_source() {
        Ok(source) => source,
        Err(e) => {
            report_init_failure(context, active, &e);
            return;
        }
    };

    if let Err(e) = source.start() {
        report_init_failure(context, active, &e);
        stop_source(source.as_mut());
        return;
    }

    tracing::info!(
        model = %context.loader.model_name(),
        wake_word = %context.settings.wake_word,
        "listening session started"
    );

    let mut capture =
        CaptureLoop::new(context, recognizer, clock).with_active(Arc::clone(active));
    announcer.status(&context.settings.listening_status());

    while active.load(Ordering::SeqCst) {
        let block = match source.read_block(context.settings.block_size) {
            Ok(block) if block.is_empty() && source.is_finite() => {
                tracing::debug!("audio source exhausted");
                if let Err(e) = capture.finish() {
                    announcer.announce(&format!("Error during listening loop: {e}"));
                }
                break;
            }
            Ok(block) => block,
            Err(e @ VoxbridgeError::AudioStreamClosed) => {
                announcer.announce(&format!("Error during listening loop: {e}"));
                break;
            }
            Err(e) => {
                announcer.announce(&format!("Error during listening loop: {e}"));
                continue;
            }
        };

        if let Err(e) = capture.process_block(&block) {
            tracing::warn!(error = %e, "block processing failed");
            announcer.announce(&format!("Error during listening loop: {e}"));
        }
    }

    capture.abandon();
    stop_source(source.as_mut());
    tracing::info!("listening session ended");
    finish_session(context, active);
}

fn report_init_failure(context: &SessionContext, active: &AtomicBool, error: &VoxbridgeError) {
    tracing::error!(error = %error, "listening session failed to start");
    context
        .announcer
        .announce(&format!("Initialization Error: {error}"));
    finish_session(context, active);
}

fn stop_source(source: &mut dyn AudioSource) {
    if let Err(e) = source.stop() {
        tracing::warn!(error = %e, "failed to stop audio source");
    }
}

/// Report idle unless whoever cleared `active` already did.
fn finish_session(context: &SessionContext, active: &AtomicBool) {
    if active
        .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        context.announcer.listening(false);
        context.announcer.status("Idle");
    }
}
