//! Speech recognition behind a narrow feed/result/reset interface.
//!
//! The capture loop owns one [`Recognizer`] per listening session, opened
//! through a [`RecognizerLoader`] when the session starts.

#[cfg(feature = "vosk-recognizer")]
pub mod vosk;

use crate::error::{Result, VoxbridgeError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Outcome of feeding one audio block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    /// The block completed a final segment; fetch it with [`Recognizer::final_result`].
    pub is_final: bool,
    /// Partial (not yet finalized) transcript of the current segment.
    pub partial: String,
}

impl Feed {
    pub fn partial(text: &str) -> Self {
        Self {
            is_final: false,
            partial: text.to_string(),
        }
    }

    pub fn finalized() -> Self {
        Self {
            is_final: true,
            partial: String::new(),
        }
    }
}

/// Trait for streaming speech recognizers.
pub trait Recognizer: Send {
    /// Feed one block of 16-bit mono PCM.
    fn feed(&mut self, samples: &[i16]) -> Result<Feed>;

    /// Text of the segment that just finalized, or of everything fed since
    /// the last reset when called without a final.
    fn final_result(&mut self) -> Result<String>;

    /// Discard all audio fed so far.
    fn reset(&mut self);
}

/// Opens a recognizer session bound to one sample rate.
pub trait RecognizerLoader: Send + Sync {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>>;

    /// Human-readable name of the model, for status output.
    fn model_name(&self) -> String;
}

/// A call observed by a [`MockRecognizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerCall {
    Feed(usize),
    Result,
    Reset,
}

#[derive(Debug, Clone)]
enum MockFeed {
    Step(Feed),
    Fail(String),
}

/// Mock recognizer for testing.
///
/// Answers feeds from a script (then with empty partials) and results from a
/// queue (then with empty text). Every call is recorded in a shared log.
#[derive(Debug, Clone, Default)]
pub struct MockRecognizer {
    feeds: VecDeque<MockFeed>,
    results: VecDeque<String>,
    calls: Arc<Mutex<Vec<RecognizerCall>>>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next feed with this partial text
    pub fn with_partial(mut self, text: &str) -> Self {
        self.feeds.push_back(MockFeed::Step(Feed::partial(text)));
        self
    }

    /// Answer the next `count` feeds with empty partial text
    pub fn with_silence(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.feeds.push_back(MockFeed::Step(Feed::default()));
        }
        self
    }

    /// Answer the next feed with a final segment
    pub fn with_final(mut self) -> Self {
        self.feeds.push_back(MockFeed::Step(Feed::finalized()));
        self
    }

    /// Fail the next feed
    pub fn with_feed_failure(mut self, message: &str) -> Self {
        self.feeds.push_back(MockFeed::Fail(message.to_string()));
        self
    }

    /// Queue the text returned by the next `final_result` call
    pub fn with_result(mut self, text: &str) -> Self {
        self.results.push_back(text.to_string());
        self
    }

    /// Shared log of calls, readable after the mock moved into a session
    pub fn calls(&self) -> Arc<Mutex<Vec<RecognizerCall>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: RecognizerCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Recognizer for MockRecognizer {
    fn feed(&mut self, samples: &[i16]) -> Result<Feed> {
        self.record(RecognizerCall::Feed(samples.len()));
        match self.feeds.pop_front() {
            Some(MockFeed::Step(feed)) => Ok(feed),
            Some(MockFeed::Fail(message)) => Err(VoxbridgeError::Recognition { message }),
            None => Ok(Feed::default()),
        }
    }

    fn final_result(&mut self) -> Result<String> {
        self.record(RecognizerCall::Result);
        Ok(self.results.pop_front().unwrap_or_default())
    }

    fn reset(&mut self) {
        self.record(RecognizerCall::Reset);
    }
}

/// Mock loader handing out prepared recognizers, one per session.
#[derive(Debug, Default)]
pub struct MockRecognizerLoader {
    sessions: Mutex<VecDeque<MockRecognizer>>,
    failure: Option<String>,
}

impl MockRecognizerLoader {
    pub fn new(recognizer: MockRecognizer) -> Self {
        Self {
            sessions: Mutex::new(VecDeque::from([recognizer])),
            failure: None,
        }
    }

    /// Loader whose every `open` fails as if the model were missing
    pub fn failing(path: &str) -> Self {
        Self {
            sessions: Mutex::new(VecDeque::new()),
            failure: Some(path.to_string()),
        }
    }

    /// Queue a recognizer for a later session
    pub fn then(self, recognizer: MockRecognizer) -> Self {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push_back(recognizer);
        }
        self
    }
}

impl RecognizerLoader for MockRecognizerLoader {
    fn open(&self, _sample_rate: u32) -> Result<Box<dyn Recognizer>> {
        if let Some(path) = &self.failure {
            return Err(VoxbridgeError::RecognizerModelNotFound { path: path.clone() });
        }
        let next = self
            .sessions
            .lock()
            .ok()
            .and_then(|mut sessions| sessions.pop_front())
            .unwrap_or_default();
        Ok(Box::new(next))
    }

    fn model_name(&self) -> String {
        "mock".to_string()
    }
}
