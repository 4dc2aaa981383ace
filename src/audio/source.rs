use crate::error::{Result, VoxbridgeError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (microphone, WAV file, mock).
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read the next block of 16-bit mono PCM samples.
    ///
    /// Blocks until `len` samples are available. An empty block means a
    /// finite source is exhausted.
    fn read_block(&mut self, len: usize) -> Result<Vec<i16>>;

    /// Returns true if this source has a finite amount of audio (file, pipe).
    fn is_finite(&self) -> bool {
        false
    }
}

/// One scripted read of a [`MockAudioSource`].
#[derive(Debug, Clone)]
enum MockRead {
    Block(Vec<i16>),
    Fail(String),
}

type ReadHook = Box<dyn FnMut(usize) + Send>;

/// Mock audio source for testing.
///
/// Plays back a script of blocks and read failures, then reports itself
/// exhausted. Start/stop state is shared so it stays observable after the
/// source has been moved into a capture thread.
pub struct MockAudioSource {
    script: VecDeque<MockRead>,
    started: Arc<AtomicBool>,
    stop_count: Arc<AtomicUsize>,
    reads: usize,
    should_fail_start: bool,
    error_message: String,
    on_read: Option<ReadHook>,
    endless: bool,
}

impl MockAudioSource {
    /// Create a new mock audio source with an empty script
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            started: Arc::new(AtomicBool::new(false)),
            stop_count: Arc::new(AtomicUsize::new(0)),
            reads: 0,
            should_fail_start: false,
            error_message: "mock audio error".to_string(),
            on_read: None,
            endless: false,
        }
    }

    /// Append one block to the script
    pub fn with_block(mut self, samples: Vec<i16>) -> Self {
        self.script.push_back(MockRead::Block(samples));
        self
    }

    /// Append `count` copies of a block to the script
    pub fn with_blocks(mut self, count: usize, samples: Vec<i16>) -> Self {
        for _ in 0..count {
            self.script.push_back(MockRead::Block(samples.clone()));
        }
        self
    }

    /// Append a failing read to the script
    pub fn with_read_failure(mut self, message: &str) -> Self {
        self.script.push_back(MockRead::Fail(message.to_string()));
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the error message for start failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Keep yielding silence after the script instead of ending, like a
    /// live microphone. Each silent read sleeps briefly.
    pub fn with_endless_silence(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Run a hook before every read, with the zero-based read index.
    pub fn on_read(mut self, hook: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_read = Some(Box::new(hook));
        self
    }

    /// Shared flag that is true while the source is started
    pub fn started_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.started)
    }

    /// Shared counter of successful `stop` calls
    pub fn stop_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.stop_count)
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of reads performed so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(VoxbridgeError::AudioCapture {
                message: self.error_message.clone(),
            })
        } else {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.started.store(false, Ordering::SeqCst);
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_block(&mut self, len: usize) -> Result<Vec<i16>> {
        let index = self.reads;
        self.reads += 1;
        if let Some(hook) = self.on_read.as_mut() {
            hook(index);
        }

        match self.script.pop_front() {
            Some(MockRead::Block(samples)) => Ok(samples),
            Some(MockRead::Fail(message)) => Err(VoxbridgeError::AudioCapture { message }),
            None if self.endless => {
                std::thread::sleep(std::time::Duration::from_millis(2));
                Ok(vec![0; len])
            }
            None => Ok(Vec::new()),
        }
    }

    fn is_finite(&self) -> bool {
        !self.endless
    }
}
