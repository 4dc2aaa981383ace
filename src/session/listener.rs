//! Start/stop control over listening sessions, one capture thread each.

use crate::audio::AudioSource;
use crate::clock::Clock;
use crate::error::Result;
use crate::session::capture::{SessionContext, run_session};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Opens a fresh audio source for each session.
pub type SourceFactory = Arc<dyn Fn() -> Result<Box<dyn AudioSource>> + Send + Sync>;

/// How long `stop` waits for the capture thread before detaching it.
const STOP_GRACE: Duration = Duration::from_secs(1);

struct ActiveSession {
    active: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns the current listening session.
///
/// Each session gets its own `active` flag, so a capture thread that is
/// still finishing after `stop` can never be revived by a later `start`.
pub struct Listener<C: Clock + Clone + 'static> {
    context: SessionContext,
    sources: SourceFactory,
    clock: C,
    session: Option<ActiveSession>,
}

impl<C: Clock + Clone + 'static> Listener<C> {
    pub fn new(context: SessionContext, sources: SourceFactory, clock: C) -> Self {
        Self {
            context,
            sources,
            clock,
            session: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.active.load(Ordering::SeqCst))
    }

    /// Start a session. Does nothing when one is already running.
    pub fn start(&mut self) {
        if self.is_listening() {
            return;
        }
        // A session that ended by itself is still parked here
        if let Some(ended) = self.session.take() {
            join_with_deadline(ended.handle, STOP_GRACE);
        }

        let active = Arc::new(AtomicBool::new(true));
        self.context.announcer.listening(true);

        let context = self.context.clone();
        let sources = Arc::clone(&self.sources);
        let clock = self.clock.clone();
        let flag = Arc::clone(&active);
        let handle = thread::spawn(move || {
            run_session(&context, || sources(), clock, &flag);
        });

        self.session = Some(ActiveSession { active, handle });
    }

    /// Stop the current session and report idle.
    ///
    /// Waits briefly for the capture thread; one stuck in a long LLM call is
    /// detached and exits on its next loop check.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        if session.active.swap(false, Ordering::SeqCst) {
            self.context.announcer.listening(false);
            self.context.announcer.status("Idle");
        }

        join_with_deadline(session.handle, STOP_GRACE);
    }

    pub fn toggle(&mut self) {
        if self.is_listening() {
            self.stop();
        } else {
            self.start();
        }
    }
}

fn join_with_deadline(handle: JoinHandle<()>, grace: Duration) {
    let deadline = Instant::now() + grace;
    let poll_interval = Duration::from_millis(10);

    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!("capture thread still busy after stop, detaching");
            return;
        }
        thread::sleep(poll_interval);
    }

    if let Err(panic_info) = handle.join() {
        let msg = panic_info
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");
        tracing::error!("capture thread panicked: {msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockAudioSource;
    use crate::clock::ManualClock;
    use crate::command::CommandHandler;
    use crate::events::{Announcer, ShellEvent};
    use crate::llm::MockLlmClient;
    use crate::recognizer::{MockRecognizer, MockRecognizerLoader};
    use crate::session::capture::SessionSettings;
    use crate::speech::{RecordingSynthesizer, SpeechQueue};
    use crossbeam_channel::{Receiver, unbounded};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Started flag, stop counter and read counter of the latest mock source
    type SourceWatch = Arc<Mutex<Option<(Arc<AtomicBool>, Arc<AtomicUsize>, Arc<AtomicUsize>)>>>;

    fn context(loader: MockRecognizerLoader) -> (SessionContext, Receiver<ShellEvent>) {
        let (speech, _worker) = SpeechQueue::spawn(RecordingSynthesizer::new());
        let (tx, rx) = unbounded();
        let announcer = Announcer::new(tx, speech);
        let context = SessionContext {
            settings: SessionSettings {
                wake_word: "computer".to_string(),
                command_timeout: Duration::from_secs(5),
                block_size: 4,
                sample_rate: 16000,
            },
            loader: Arc::new(loader),
            announcer: announcer.clone(),
            handler: CommandHandler::new(Arc::new(MockLlmClient::new()), announcer),
        };
        (context, rx)
    }

    /// Factory of endless mock microphones, each reported through `watch`
    fn live_sources(watch: SourceWatch) -> SourceFactory {
        Arc::new(move || -> Result<Box<dyn AudioSource>> {
            let reads = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&reads);
            let source = MockAudioSource::new()
                .with_endless_silence()
                .on_read(move |index| counter.store(index + 1, Ordering::SeqCst));
            if let Ok(mut slot) = watch.lock() {
                *slot = Some((source.started_flag(), source.stop_counter(), reads));
            }
            Ok(Box::new(source) as Box<dyn AudioSource>)
        })
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_toggle_starts_and_stops() {
        let (context, events) = context(MockRecognizerLoader::default());
        let mut listener = Listener::new(context, live_sources(SourceWatch::default()), ManualClock::new());

        listener.toggle();
        assert!(listener.is_listening());
        assert!(wait_until(|| {
            events
                .try_iter()
                .any(|e| e == ShellEvent::Status("Listening for 'computer'...".to_string()))
        }));

        listener.toggle();
        assert!(!listener.is_listening());

        let tail: Vec<ShellEvent> = events.try_iter().collect();
        assert!(tail.contains(&ShellEvent::Listening(false)));
        assert_eq!(
            tail.iter()
                .filter(|e| **e == ShellEvent::Status("Idle".to_string()))
                .count(),
            1
        );
    }

    #[test]
    fn test_start_twice_keeps_one_session() {
        let (context, events) = context(MockRecognizerLoader::default());
        let mut listener = Listener::new(context, live_sources(SourceWatch::default()), ManualClock::new());

        listener.start();
        listener.start();
        listener.stop();

        let starts = events
            .try_iter()
            .filter(|e| *e == ShellEvent::Listening(true))
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_stop_in_command_window_closes_source() {
        let (context, events) = context(MockRecognizerLoader::new(
            MockRecognizer::new().with_partial("computer"),
        ));
        let watch = SourceWatch::default();
        let mut listener = Listener::new(context, live_sources(Arc::clone(&watch)), ManualClock::new());

        listener.start();
        assert!(wait_until(|| {
            events
                .try_iter()
                .any(|e| e == ShellEvent::Status("Speak your query now...".to_string()))
        }));
        let (started, stops, reads) = watch.lock().unwrap().clone().unwrap();
        assert!(wait_until(|| reads.load(Ordering::SeqCst) >= 3));
        assert!(started.load(Ordering::SeqCst));

        listener.stop();

        assert!(!listener.is_listening());
        assert!(wait_until(|| stops.load(Ordering::SeqCst) == 1));
        assert!(!started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_session_that_ends_itself_reports_idle_and_can_restart() {
        let (context, events) = context(MockRecognizerLoader::failing("missing-model"));
        let mut listener = Listener::new(context, live_sources(SourceWatch::default()), ManualClock::new());

        listener.start();
        assert!(wait_until(|| !listener.is_listening()));

        listener.start();
        assert!(wait_until(|| !listener.is_listening()));
        listener.stop();

        let idles = events
            .try_iter()
            .filter(|e| *e == ShellEvent::Status("Idle".to_string()))
            .count();
        assert_eq!(idles, 2);
    }

    #[test]
    fn test_stop_without_session_is_noop() {
        let (context, events) = context(MockRecognizerLoader::default());
        let mut listener = Listener::new(context, live_sources(SourceWatch::default()), ManualClock::new());

        listener.stop();

        assert!(events.try_iter().next().is_none());
    }
}
