//! Voice command control for the pipeline.
//!
//! # Design
//!
//! A [`SpeechRecognizer`] is the host's recognition facility.  It is driven
//! with `start` / `stop` requests and reports back asynchronously with
//! [`RecognitionEvent`]s over a tokio channel: `Started`, one final
//! `Result` or an `Error`, then `Ended`.  Recognition is non-continuous:
//! one result per listening session.
//!
//! [`VoiceCommandListener`] owns the listening state, turns recognised
//! phrases into [`PipelineCommand::Start`](crate::pipeline::PipelineCommand)
//! and refuses to toggle while a run is in flight.
//!
//! [`ConsoleRecognizer`] is the terminal host implementation: each session
//! takes one typed line from an interactive stdin.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use compliance_agent::config::VoiceConfig;
//! use compliance_agent::pipeline::PipelinePhase;
//! use compliance_agent::voice::{ConsoleRecognizer, SpeechRecognizer, VoiceCommandListener};
//!
//! # async fn example() {
//! let config = VoiceConfig::default();
//! let (event_tx, mut event_rx) = mpsc::unbounded_channel();
//! let (command_tx, _command_rx) = mpsc::channel(16);
//!
//! let recognizer = ConsoleRecognizer::detect(event_tx, &config.language)
//!     .map(|r| Arc::new(r) as Arc<dyn SpeechRecognizer>);
//! let mut listener = VoiceCommandListener::new(recognizer, &config, command_tx);
//!
//! listener.toggle(PipelinePhase::Idle);
//! while let Some(event) = event_rx.recv().await {
//!     listener.handle_event(event);
//! }
//! # }
//! ```

pub mod console;
pub mod listener;

pub use console::ConsoleRecognizer;
pub use listener::{ListenerState, VoiceCommand, VoiceCommandListener};

use thiserror::Error;

// ---------------------------------------------------------------------------
// RecognitionEvent
// ---------------------------------------------------------------------------

/// Events delivered by a recogniser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The session is capturing audio.
    Started,
    /// The final transcript of the session.
    Result(String),
    /// The session failed.
    Error(String),
    /// The session is over, with or without a result.
    Ended,
}

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// Errors returned synchronously by a start request.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// A session is already running.
    #[error("already listening")]
    AlreadyListening,

    /// The input source is exhausted; no further sessions are possible.
    #[error("no more speech input available")]
    EndOfInput,

    /// The host facility failed.
    #[error("speech recognition failed: {0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// SpeechRecognizer trait
// ---------------------------------------------------------------------------

/// Host speech-recognition facility.
///
/// `start` and `stop` are requests; the resulting state change is reported
/// through [`RecognitionEvent`]s.
pub trait SpeechRecognizer: Send + Sync {
    fn start(&self) -> Result<(), RecognitionError>;
    fn stop(&self);
}
