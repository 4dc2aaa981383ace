//! Default configuration constants for voxbridge.
//!
//! These are the values the assistant runs with when no configuration file
//! is present. `Config::default()` is built from them.

/// Default audio sample rate in Hz.
///
/// 16kHz is what the bundled Vosk models are trained on.
pub const SAMPLE_RATE: u32 = 16000;

/// Number of samples pulled from the audio stream per loop iteration.
///
/// 4000 samples at 16kHz is 250ms of audio per recognizer feed.
pub const BLOCK_SIZE: usize = 4000;

/// Phrase that opens the command window when it appears in a partial transcript.
pub const WAKE_WORD: &str = "computer";

/// Silence allowed inside the command window before the buffered audio is
/// force-finalized, in milliseconds.
pub const COMMAND_TIMEOUT_MS: u64 = 5000;

/// Directory of the Vosk model loaded at session start.
pub const MODEL_PATH: &str = "vosk-model-en-in-0.5";

/// Local LLM generate endpoint (Ollama).
pub const LLM_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Model name sent in the LLM request payload.
pub const LLM_MODEL: &str = "llama3";

/// Socket timeout for the LLM request, in seconds.
pub const LLM_TIMEOUT_SECS: u64 = 60;

/// Program used to render speech.
pub const SPEECH_PROGRAM: &str = "espeak-ng";

/// Placeholder in speech arguments replaced by the utterance text.
pub const SPEECH_TEXT_PLACEHOLDER: &str = "{text}";

/// Spoken when the command window times out without a usable transcript.
pub const NOT_UNDERSTOOD_NOTICE: &str = "I heard something, but could not understand.";

/// Reply used when the LLM answers 2xx without a `response` field.
pub const MISSING_RESPONSE_NOTICE: &str = "No response text found in LLM output.";
