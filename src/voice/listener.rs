//! Listening state machine and command matching.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::capability::Capability;
use crate::config::VoiceConfig;
use crate::pipeline::{PipelineCommand, PipelinePhase};

use super::{RecognitionEvent, SpeechRecognizer};

/// Whether a recognition session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerState {
    #[default]
    Idle,
    Listening,
}

/// Commands understood by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    StartPipeline,
}

/// Turns recognised speech into pipeline commands.
pub struct VoiceCommandListener {
    recognizer: Capability<Arc<dyn SpeechRecognizer>>,
    state: ListenerState,
    phrases: Vec<String>,
    commands: mpsc::Sender<PipelineCommand>,
}

impl VoiceCommandListener {
    pub fn new(
        recognizer: Capability<Arc<dyn SpeechRecognizer>>,
        config: &VoiceConfig,
        commands: mpsc::Sender<PipelineCommand>,
    ) -> Self {
        if !recognizer.is_available() {
            log::warn!("voice: speech recognition not supported here, voice control disabled");
        }
        Self {
            recognizer,
            state: ListenerState::Idle,
            phrases: config
                .trigger_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            commands,
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// `false` when the host has no recogniser; toggling then does nothing.
    pub fn is_enabled(&self) -> bool {
        self.recognizer.is_available()
    }

    /// Ask the recogniser to start or stop.
    ///
    /// Ignored while `phase` is busy.  Returns `true` when a request was
    /// issued; the state itself changes when the recogniser reports back.
    pub fn toggle(&mut self, phase: PipelinePhase) -> bool {
        if phase.is_busy() {
            log::debug!("voice: toggle ignored while pipeline is {}", phase.label());
            return false;
        }
        let Capability::Available(recognizer) = &self.recognizer else {
            return false;
        };

        match self.state {
            ListenerState::Listening => {
                recognizer.stop();
                true
            }
            ListenerState::Idle => match recognizer.start() {
                Ok(()) => true,
                Err(e) => {
                    log::error!("voice: cannot start listening: {e}");
                    false
                }
            },
        }
    }

    /// Apply a recogniser event.  Returns the command dispatched, if any.
    pub fn handle_event(&mut self, event: RecognitionEvent) -> Option<VoiceCommand> {
        match event {
            RecognitionEvent::Started => {
                self.state = ListenerState::Listening;
                None
            }
            RecognitionEvent::Ended => {
                self.state = ListenerState::Idle;
                None
            }
            RecognitionEvent::Error(message) => {
                log::error!("voice: speech recognition error: {message}");
                self.state = ListenerState::Idle;
                None
            }
            RecognitionEvent::Result(transcript) => {
                let command = self.parse(&transcript)?;
                match self.commands.try_send(PipelineCommand::Start) {
                    Ok(()) => Some(command),
                    Err(e) => {
                        log::warn!("voice: cannot reach pipeline: {e}");
                        None
                    }
                }
            }
        }
    }

    /// Match a transcript against the trigger phrases.
    pub fn parse(&self, transcript: &str) -> Option<VoiceCommand> {
        let heard = transcript.trim().to_lowercase();
        log::info!("voice: command received: {heard:?}");
        self.phrases
            .iter()
            .any(|phrase| heard.contains(phrase.as_str()))
            .then_some(VoiceCommand::StartPipeline)
    }
}

impl Drop for VoiceCommandListener {
    fn drop(&mut self) {
        if self.state == ListenerState::Listening {
            if let Capability::Available(recognizer) = &self.recognizer {
                recognizer.stop();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::voice::RecognitionError;

    #[derive(Default)]
    struct MockRecognizer {
        starts: AtomicUsize,
        stops: AtomicUsize,
        refuse_start: bool,
    }

    impl SpeechRecognizer for MockRecognizer {
        fn start(&self) -> Result<(), RecognitionError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.refuse_start {
                Err(RecognitionError::Failed("microphone busy".into()))
            } else {
                Ok(())
            }
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn listener_with(
        mock: Arc<MockRecognizer>,
    ) -> (VoiceCommandListener, mpsc::Receiver<PipelineCommand>) {
        let (tx, rx) = mpsc::channel(8);
        let recognizer: Arc<dyn SpeechRecognizer> = mock;
        (
            VoiceCommandListener::new(
                Capability::Available(recognizer),
                &VoiceConfig::default(),
                tx,
            ),
            rx,
        )
    }

    #[test]
    fn matching_phrase_starts_pipeline_once() {
        let (mut listener, mut rx) = listener_with(Arc::new(MockRecognizer::default()));

        let command = listener.handle_event(RecognitionEvent::Result(
            "please start analysis now".into(),
        ));
        assert_eq!(command, Some(VoiceCommand::StartPipeline));
        assert_eq!(rx.try_recv().ok(), Some(PipelineCommand::Start));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unrelated_phrase_does_nothing() {
        let (mut listener, mut rx) = listener_with(Arc::new(MockRecognizer::default()));

        assert_eq!(
            listener.handle_event(RecognitionEvent::Result("hello".into())),
            None
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn matching_ignores_case_and_padding() {
        let (listener, _rx) = listener_with(Arc::new(MockRecognizer::default()));
        assert_eq!(
            listener.parse("  Run Pipeline  "),
            Some(VoiceCommand::StartPipeline)
        );
        assert_eq!(listener.parse("run the pipeline"), None);
    }

    #[test]
    fn toggle_is_ignored_while_pipeline_busy() {
        let mock = Arc::new(MockRecognizer::default());
        let (mut listener, _rx) = listener_with(mock.clone());

        for phase in [
            PipelinePhase::Translating,
            PipelinePhase::CheckingCompliance,
            PipelinePhase::Persisting,
        ] {
            assert!(!listener.toggle(phase));
            assert_eq!(listener.state(), ListenerState::Idle);
        }
        assert_eq!(mock.starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn toggle_while_persisting_leaves_listening_session_alone() {
        let mock = Arc::new(MockRecognizer::default());
        let (mut listener, _rx) = listener_with(mock.clone());
        listener.handle_event(RecognitionEvent::Started);

        assert!(!listener.toggle(PipelinePhase::Persisting));
        assert_eq!(listener.state(), ListenerState::Listening);
        assert_eq!(mock.stops.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn toggle_starts_then_stops() {
        let mock = Arc::new(MockRecognizer::default());
        let (mut listener, _rx) = listener_with(mock.clone());

        assert!(listener.toggle(PipelinePhase::Idle));
        assert_eq!(mock.starts.load(Ordering::SeqCst), 1);
        // State follows the recogniser, not the request.
        assert_eq!(listener.state(), ListenerState::Idle);

        listener.handle_event(RecognitionEvent::Started);
        assert_eq!(listener.state(), ListenerState::Listening);

        assert!(listener.toggle(PipelinePhase::Completed));
        assert_eq!(mock.stops.load(Ordering::SeqCst), 1);

        listener.handle_event(RecognitionEvent::Ended);
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[test]
    fn recognition_error_returns_to_idle() {
        let (mut listener, _rx) = listener_with(Arc::new(MockRecognizer::default()));
        listener.handle_event(RecognitionEvent::Started);

        listener.handle_event(RecognitionEvent::Error("no-speech".into()));
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[test]
    fn failed_start_keeps_idle() {
        let mock = Arc::new(MockRecognizer {
            refuse_start: true,
            ..MockRecognizer::default()
        });
        let (mut listener, _rx) = listener_with(mock);

        assert!(!listener.toggle(PipelinePhase::Error));
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[test]
    fn unavailable_recognizer_disables_toggle() {
        let (tx, _rx) = mpsc::channel(1);
        let mut listener =
            VoiceCommandListener::new(Capability::Unavailable, &VoiceConfig::default(), tx);

        assert!(!listener.is_enabled());
        assert!(!listener.toggle(PipelinePhase::Idle));
        assert_eq!(listener.state(), ListenerState::Idle);
    }

    #[test]
    fn drop_while_listening_stops_recognizer() {
        let mock = Arc::new(MockRecognizer::default());
        let (mut listener, _rx) = listener_with(mock.clone());
        listener.handle_event(RecognitionEvent::Started);

        drop(listener);
        assert_eq!(mock.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_while_idle_does_not_stop() {
        let mock = Arc::new(MockRecognizer::default());
        let (listener, _rx) = listener_with(mock.clone());

        drop(listener);
        assert_eq!(mock.stops.load(Ordering::SeqCst), 0);
    }
}
