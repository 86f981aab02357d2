//! Terminal speech recogniser.
//!
//! Each listening session takes one line from the input.  The input is read
//! on a dedicated OS thread because `BufRead::read_line` blocks and cannot be
//! interrupted.  Lines typed while no session is active are discarded.
//!
//! `stop` ends the session immediately; the reader thread stays parked in
//! `read_line` until the next line or end of input, then keeps going.

use std::io::{BufRead, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::capability::Capability;

use super::{RecognitionError, RecognitionEvent, SpeechRecognizer};

type Input = Box<dyn BufRead + Send>;

#[derive(Default)]
struct Session {
    active: AtomicBool,
    exhausted: AtomicBool,
}

// ---------------------------------------------------------------------------
// ConsoleRecognizer
// ---------------------------------------------------------------------------

pub struct ConsoleRecognizer {
    language: String,
    session: Arc<Session>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    /// Taken by the reader thread on the first `start`.
    input: Mutex<Option<Input>>,
}

impl ConsoleRecognizer {
    /// Use stdin when it is an interactive terminal.
    pub fn detect(
        events: mpsc::UnboundedSender<RecognitionEvent>,
        language: &str,
    ) -> Capability<Self> {
        if !std::io::stdin().is_terminal() {
            log::info!("voice: stdin is not a terminal, console recogniser unavailable");
            return Capability::Unavailable;
        }
        let stdin = std::io::BufReader::new(std::io::stdin());
        Capability::Available(Self::with_input(Box::new(stdin), events, language))
    }

    /// Read sessions from an arbitrary line source.
    pub fn with_input(
        input: Input,
        events: mpsc::UnboundedSender<RecognitionEvent>,
        language: &str,
    ) -> Self {
        Self {
            language: language.to_string(),
            session: Arc::new(Session::default()),
            events,
            input: Mutex::new(Some(input)),
        }
    }

    fn ensure_reader(&self) -> Result<(), RecognitionError> {
        let mut slot = self.input.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(input) = slot.take() else {
            return Ok(());
        };

        let session = Arc::clone(&self.session);
        let events = self.events.clone();
        std::thread::Builder::new()
            .name("voice-console".into())
            .spawn(move || read_loop(input, &session, &events))
            .map(|_| ())
            .map_err(|e| RecognitionError::Failed(format!("cannot spawn reader thread: {e}")))
    }
}

impl SpeechRecognizer for ConsoleRecognizer {
    fn start(&self) -> Result<(), RecognitionError> {
        if self.session.exhausted.load(Ordering::SeqCst) {
            return Err(RecognitionError::EndOfInput);
        }
        if self.session.active.swap(true, Ordering::SeqCst) {
            return Err(RecognitionError::AlreadyListening);
        }
        // Started must be queued before the reader can answer.
        let _ = self.events.send(RecognitionEvent::Started);
        eprintln!("🎤 listening ({}), type a command:", self.language);

        if let Err(e) = self.ensure_reader() {
            self.stop();
            return Err(e);
        }
        Ok(())
    }

    fn stop(&self) {
        if self.session.active.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(RecognitionEvent::Ended);
        }
    }
}

impl Drop for ConsoleRecognizer {
    fn drop(&mut self) {
        self.session.active.store(false, Ordering::SeqCst);
    }
}

fn read_loop(
    mut input: Input,
    session: &Session,
    events: &mpsc::UnboundedSender<RecognitionEvent>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        let failure = match input.read_line(&mut line) {
            Ok(0) => "end of input".to_string(),
            Ok(_) => {
                if session.active.swap(false, Ordering::SeqCst) {
                    let _ = events.send(RecognitionEvent::Result(line.trim().to_string()));
                    let _ = events.send(RecognitionEvent::Ended);
                } else {
                    log::debug!("voice: discarding input typed while not listening");
                }
                continue;
            }
            Err(e) => e.to_string(),
        };

        session.exhausted.store(true, Ordering::SeqCst);
        if session.active.swap(false, Ordering::SeqCst) {
            let _ = events.send(RecognitionEvent::Error(failure));
            let _ = events.send(RecognitionEvent::Ended);
        }
        return;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn recognizer(
        text: &'static str,
    ) -> (ConsoleRecognizer, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let input: Input = Box::new(Cursor::new(text.as_bytes()));
        (ConsoleRecognizer::with_input(input, tx, "en-US"), rx)
    }

    #[tokio::test]
    async fn one_line_per_session() {
        let (rec, mut rx) = recognizer("  Start Analysis please \n");

        rec.start().unwrap();
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Started));
        assert_eq!(
            rx.recv().await,
            Some(RecognitionEvent::Result("Start Analysis please".into()))
        );
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Ended));
    }

    #[tokio::test]
    async fn end_of_input_reports_error_then_refuses_start() {
        let (rec, mut rx) = recognizer("");

        rec.start().unwrap();
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Started));
        assert!(matches!(rx.recv().await, Some(RecognitionEvent::Error(_))));
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Ended));

        assert!(matches!(rec.start(), Err(RecognitionError::EndOfInput)));
    }

    #[cfg(unix)]
    #[test]
    fn second_start_while_listening_is_refused() {
        let (tx, _rx) = mpsc::unbounded_channel();
        // Never yields a line, so the first session stays open.
        let (_writer, reader) = std::os::unix::net::UnixStream::pair().unwrap();
        let input: Input = Box::new(std::io::BufReader::new(reader));
        let rec = ConsoleRecognizer::with_input(input, tx, "en-US");

        rec.start().unwrap();
        assert!(matches!(rec.start(), Err(RecognitionError::AlreadyListening)));
    }

    #[cfg(unix)]
    #[test]
    fn stop_ends_session_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_writer, reader) = std::os::unix::net::UnixStream::pair().unwrap();
        let input: Input = Box::new(std::io::BufReader::new(reader));
        let rec = ConsoleRecognizer::with_input(input, tx, "en-US");

        rec.start().unwrap();
        rec.stop();
        rec.stop();

        assert_eq!(rx.try_recv().ok(), Some(RecognitionEvent::Started));
        assert_eq!(rx.try_recv().ok(), Some(RecognitionEvent::Ended));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stop_without_session_is_silent() {
        let (rec, mut rx) = recognizer("start analysis\n");
        rec.stop();
        assert!(rx.try_recv().is_err());
    }
}
