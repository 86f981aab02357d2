//! Spoken progress narration.
//!
//! [`NarrationSink`] turns status strings into utterances and hands them to a
//! [`SpeechSynthesizer`], fire-and-forget.  Utterances play in the
//! synthesiser's own order; the sink never queues, reorders or interrupts.
//! [`NarrationSink::finish`] waits (bounded) for queued speech to play out.
//! When the last clone of a sink is dropped, pending speech is cancelled.
//!
//! [`ProcessSynthesizer`] is the host implementation: it drives an installed
//! text-to-speech program (`espeak-ng`, `espeak`, `say`).  When none is
//! installed the sink is built with [`Capability::Unavailable`] and every
//! `speak` is a no-op.
//!
//! # Usage
//!
//! ```no_run
//! use compliance_agent::config::NarrationConfig;
//! use compliance_agent::narration::NarrationSink;
//!
//! let sink = NarrationSink::from_config(&NarrationConfig::default());
//! sink.speak("Starting localization and accessibility analysis.");
//! ```

pub mod process;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::capability::Capability;
use crate::config::NarrationConfig;

pub use process::ProcessSynthesizer;

// ---------------------------------------------------------------------------
// Utterance / SynthesisError
// ---------------------------------------------------------------------------

/// One piece of text to speak.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Relative speaking rate; `1.0` is the synthesiser's normal speed.
    pub rate: f32,
}

/// Errors a synthesiser can report when accepting an utterance.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The playback worker thread could not be started.
    #[error("cannot start speech worker: {0}")]
    Worker(String),

    /// The playback worker has exited and accepts no more utterances.
    #[error("speech worker is no longer running")]
    WorkerGone,
}

// ---------------------------------------------------------------------------
// SpeechSynthesizer trait
// ---------------------------------------------------------------------------

/// Host text-to-speech facility.
///
/// `speak` enqueues and returns immediately; `cancel` drops everything queued
/// and stops the utterance in progress.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError>;
    fn cancel(&self);
    /// Block until every accepted utterance has played or been skipped.
    fn wait_idle(&self);
}

// ---------------------------------------------------------------------------
// NarrationSink
// ---------------------------------------------------------------------------

/// Default bound for [`NarrationSink::finish`].
const DEFAULT_FINISH_LIMIT: Duration = Duration::from_secs(15);

struct SinkInner {
    synth: Capability<Arc<dyn SpeechSynthesizer>>,
    rate: f32,
    finish_limit: Duration,
}

impl Drop for SinkInner {
    fn drop(&mut self) {
        if let Capability::Available(synth) = &self.synth {
            log::debug!("narration: cancelling pending speech");
            synth.cancel();
        }
    }
}

/// Best-effort narration handle.  Cheap to clone.
#[derive(Clone)]
pub struct NarrationSink {
    inner: Arc<SinkInner>,
}

impl NarrationSink {
    pub fn new(synth: Capability<Arc<dyn SpeechSynthesizer>>, rate: f32) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                synth,
                rate,
                finish_limit: DEFAULT_FINISH_LIMIT,
            }),
        }
    }

    /// Bound [`finish`](Self::finish) by `limit`.  Call before cloning.
    pub fn with_finish_limit(mut self, limit: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.finish_limit = limit;
        }
        self
    }

    /// Detect the host synthesiser described by `config`.
    pub fn from_config(config: &NarrationConfig) -> Self {
        let synth = ProcessSynthesizer::detect(config)
            .map(|s| Arc::new(s) as Arc<dyn SpeechSynthesizer>);
        if !synth.is_available() {
            log::info!("narration: no speech synthesiser available, narration disabled");
        }
        Self::new(synth, config.rate).with_finish_limit(config.finish_timeout())
    }

    /// A sink that never speaks.
    pub fn silent() -> Self {
        Self::new(Capability::Unavailable, 1.0)
    }

    pub fn is_available(&self) -> bool {
        self.inner.synth.is_available()
    }

    /// Enqueue `text` at the configured rate.  Never fails.
    pub fn speak(&self, text: &str) {
        let Capability::Available(synth) = &self.inner.synth else {
            log::debug!("narration: (silent) {text}");
            return;
        };

        let utterance = Utterance {
            text: text.to_string(),
            rate: self.inner.rate,
        };
        if let Err(e) = synth.speak(utterance) {
            log::warn!("narration: utterance dropped: {e}");
        }
    }

    /// Wait for queued speech to play out, at most the finish limit.
    ///
    /// Returns `false` when the limit expired first.  Whatever is still
    /// queued then is cut off when the last clone is dropped.
    pub async fn finish(&self) -> bool {
        let Capability::Available(synth) = &self.inner.synth else {
            return true;
        };

        let synth = Arc::clone(synth);
        let waiting = tokio::task::spawn_blocking(move || synth.wait_idle());
        match tokio::time::timeout(self.inner.finish_limit, waiting).await {
            Ok(_) => true,
            Err(_) => {
                log::warn!(
                    "narration: speech still queued after {:?}, cutting it off",
                    self.inner.finish_limit
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockSynthesizer  (test-only)
// ---------------------------------------------------------------------------

/// Records utterances instead of speaking them.
#[cfg(test)]
#[derive(Default)]
pub struct MockSynthesizer {
    pub spoken: std::sync::Mutex<Vec<Utterance>>,
    pub cancelled: std::sync::atomic::AtomicUsize,
    pub waited: std::sync::atomic::AtomicUsize,
    /// `"speak"`, `"wait"` and `"cancel"` in call order.
    pub calls: std::sync::Mutex<Vec<&'static str>>,
}

#[cfg(test)]
impl MockSynthesizer {
    pub fn texts(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }
}

#[cfg(test)]
impl SpeechSynthesizer for MockSynthesizer {
    fn speak(&self, utterance: Utterance) -> Result<(), SynthesisError> {
        self.spoken.lock().unwrap().push(utterance);
        self.calls.lock().unwrap().push("speak");
        Ok(())
    }

    fn cancel(&self) {
        self.cancelled
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.calls.lock().unwrap().push("cancel");
    }

    fn wait_idle(&self) {
        self.waited.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.calls.lock().unwrap().push("wait");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn sink_with_mock(rate: f32) -> (NarrationSink, Arc<MockSynthesizer>) {
        let mock = Arc::new(MockSynthesizer::default());
        let synth: Arc<dyn SpeechSynthesizer> = mock.clone();
        (NarrationSink::new(Capability::Available(synth), rate), mock)
    }

    #[test]
    fn speak_enqueues_at_configured_rate() {
        let (sink, mock) = sink_with_mock(1.1);
        sink.speak("one");
        sink.speak("two");

        let spoken = mock.spoken.lock().unwrap().clone();
        assert_eq!(spoken.len(), 2);
        assert_eq!(spoken[0].text, "one");
        assert_eq!(spoken[1].text, "two");
        assert!((spoken[0].rate - 1.1).abs() < f32::EPSILON);
    }

    #[test]
    fn speak_never_cancels_previous_utterances() {
        let (sink, mock) = sink_with_mock(1.0);
        sink.speak("one");
        sink.speak("two");
        assert_eq!(mock.cancelled.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropping_last_clone_cancels_speech() {
        let (sink, mock) = sink_with_mock(1.0);
        let clone = sink.clone();
        drop(sink);
        assert_eq!(mock.cancelled.load(Ordering::SeqCst), 0);
        drop(clone);
        assert_eq!(mock.cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unavailable_sink_is_a_no_op() {
        let sink = NarrationSink::silent();
        assert!(!sink.is_available());
        sink.speak("nobody hears this");
    }

    #[tokio::test]
    async fn finish_waits_for_synthesizer_then_drop_cancels() {
        let (sink, mock) = sink_with_mock(1.0);
        sink.speak("last words");

        assert!(sink.finish().await);
        assert_eq!(mock.waited.load(Ordering::SeqCst), 1);
        assert_eq!(mock.cancelled.load(Ordering::SeqCst), 0);

        drop(sink);
        assert_eq!(mock.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(mock.texts(), ["last words"]);
    }

    /// Never becomes idle.
    struct StuckSynthesizer;

    impl SpeechSynthesizer for StuckSynthesizer {
        fn speak(&self, _utterance: Utterance) -> Result<(), SynthesisError> {
            Ok(())
        }

        fn cancel(&self) {}

        fn wait_idle(&self) {
            std::thread::sleep(Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn finish_gives_up_after_limit() {
        let synth: Arc<dyn SpeechSynthesizer> = Arc::new(StuckSynthesizer);
        let sink = NarrationSink::new(Capability::Available(synth), 1.0)
            .with_finish_limit(Duration::from_millis(20));
        sink.speak("forever");
        assert!(!sink.finish().await);
    }

    #[tokio::test]
    async fn silent_sink_finishes_immediately() {
        assert!(NarrationSink::silent().finish().await);
    }

    #[test]
    fn disabled_config_yields_silent_sink() {
        let config = NarrationConfig {
            enabled: false,
            ..NarrationConfig::default()
        };
        assert!(!NarrationSink::from_config(&config).is_available());
    }
}
