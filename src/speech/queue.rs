//! FIFO of utterances drained by one background speech worker.

use crate::speech::SpeechSynthesizer;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::thread::{self, JoinHandle};

/// Cloneable handle for queueing text to be spoken.
///
/// Utterances are spoken one at a time in enqueue order. The worker thread
/// exits once every handle has been dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct SpeechQueue {
    tx: Sender<String>,
}

impl SpeechQueue {
    /// Start the speech worker. The returned handle only needs joining when
    /// the caller wants to wait for pending speech to finish.
    pub fn spawn<S: SpeechSynthesizer + 'static>(synthesizer: S) -> (Self, JoinHandle<()>) {
        let (tx, rx) = unbounded::<String>();
        let handle = thread::spawn(move || run_worker(&synthesizer, rx));
        (Self { tx }, handle)
    }

    /// Queue `text` for speech. Blank text is dropped.
    pub fn enqueue(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if self.tx.send(text.to_string()).is_err() {
            tracing::warn!("speech worker has stopped, dropping utterance");
        }
    }
}

fn run_worker<S: SpeechSynthesizer>(synthesizer: &S, rx: Receiver<String>) {
    tracing::debug!("speech worker started");
    for text in rx {
        if let Err(e) = synthesizer.speak(&text) {
            tracing::error!(error = %e, "speech synthesis failed");
        }
    }
    tracing::debug!("speech worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::RecordingSynthesizer;
    use std::time::Duration;

    #[test]
    fn test_utterances_play_in_order_without_overlap() {
        let synth = RecordingSynthesizer::new().with_duration(Duration::from_millis(20));
        let (queue, worker) = SpeechQueue::spawn(synth.clone());

        queue.enqueue("one");
        queue.enqueue("two");
        queue.enqueue("three");
        drop(queue);
        worker.join().unwrap();

        let spoken = synth.utterances();
        assert_eq!(
            spoken.iter().map(|u| u.text.as_str()).collect::<Vec<_>>(),
            vec!["one", "two", "three"]
        );
        for pair in spoken.windows(2) {
            assert!(
                pair[0].finished <= pair[1].started,
                "'{}' overlapped '{}'",
                pair[0].text,
                pair[1].text
            );
        }
    }

    #[test]
    fn test_blank_utterances_are_dropped() {
        let synth = RecordingSynthesizer::new();
        let (queue, worker) = SpeechQueue::spawn(synth.clone());

        queue.enqueue("");
        queue.enqueue("   ");
        queue.enqueue("hello");
        drop(queue);
        worker.join().unwrap();

        assert_eq!(synth.texts(), vec!["hello"]);
    }

    #[test]
    fn test_render_failure_does_not_stop_worker() {
        let synth = RecordingSynthesizer::new().failing_on("broken");
        let (queue, worker) = SpeechQueue::spawn(synth.clone());

        queue.enqueue("before");
        queue.enqueue("broken");
        queue.enqueue("after");
        drop(queue);
        worker.join().unwrap();

        assert_eq!(synth.texts(), vec!["before", "after"]);
    }

    #[test]
    fn test_worker_outlives_clones_until_last_handle_drops() {
        let synth = RecordingSynthesizer::new();
        let (queue, worker) = SpeechQueue::spawn(synth.clone());
        let clone = queue.clone();
        drop(queue);

        clone.enqueue("still here");
        drop(clone);
        worker.join().unwrap();

        assert_eq!(synth.texts(), vec!["still here"]);
    }
}
