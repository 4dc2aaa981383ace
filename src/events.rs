//! Events flowing from worker threads to the shell, and the announcer that
//! fans messages out to the shell and the speech queue.

use crate::speech::SpeechQueue;
use crossbeam_channel::Sender;

/// Update for the shell to render. Worker threads never touch the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// Replace the status line.
    Status(String),
    /// Append a line to the scrolling log.
    Log(String),
    /// Listening session started (`true`) or ended (`false`).
    Listening(bool),
}

/// Posts shell events and speaks when asked to.
#[derive(Debug, Clone)]
pub struct Announcer {
    events: Sender<ShellEvent>,
    speech: SpeechQueue,
}

impl Announcer {
    pub fn new(events: Sender<ShellEvent>, speech: SpeechQueue) -> Self {
        Self { events, speech }
    }

    pub fn status(&self, text: &str) {
        self.emit(ShellEvent::Status(text.to_string()));
    }

    /// Log without speaking
    pub fn note(&self, text: &str) {
        self.emit(ShellEvent::Log(text.to_string()));
    }

    /// Log and speak
    pub fn announce(&self, text: &str) {
        self.note(text);
        self.speech.enqueue(text);
    }

    /// Speak without logging
    pub fn say(&self, text: &str) {
        self.speech.enqueue(text);
    }

    pub fn listening(&self, active: bool) {
        self.emit(ShellEvent::Listening(active));
    }

    fn emit(&self, event: ShellEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("shell event receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::RecordingSynthesizer;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_note_logs_without_speaking_and_announce_does_both() {
        let synth = RecordingSynthesizer::new();
        let (speech, worker) = SpeechQueue::spawn(synth.clone());
        let (tx, rx) = unbounded();
        let announcer = Announcer::new(tx, speech);

        announcer.status("Idle");
        announcer.note("quiet line");
        announcer.announce("loud line");
        announcer.say("spoken only");
        drop(announcer);
        worker.join().unwrap();

        let events: Vec<ShellEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ShellEvent::Status("Idle".to_string()),
                ShellEvent::Log("quiet line".to_string()),
                ShellEvent::Log("loud line".to_string()),
            ]
        );
        assert_eq!(synth.texts(), vec!["loud line", "spoken only"]);
    }

    #[test]
    fn test_emit_after_shell_closed_is_silent() {
        let (speech, _worker) = SpeechQueue::spawn(RecordingSynthesizer::new());
        let (tx, rx) = unbounded();
        drop(rx);

        let announcer = Announcer::new(tx, speech);
        announcer.status("nobody is watching");
        announcer.listening(false);
    }
}
