//! Pipeline orchestrator module.
//!
//! This module wires the translate → compliance check → persist sequence and
//! exposes the shared state that the display surface and voice listener read.
//!
//! # Architecture
//!
//! ```text
//! PipelineCommand (mpsc) ◀── CLI trigger / VoiceCommandListener
//!        │
//!        ▼
//! PipelineOrchestrator::run()  ← async tokio task
//!        │
//!        ├─ Start        → Translating → CheckingCompliance → Persisting → Completed
//!        │                                      └─ analysis failed ──▶ Error
//!        └─ ClearIssues  → issues emptied, phase untouched
//!
//! SharedState (Arc<Mutex<AppState>>)     ←── read by display + voice listener
//! PipelineUpdate (mpsc, optional)        ──▶ display surface
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use compliance_agent::config::AppConfig;
//! use compliance_agent::gateway::GeminiAnalyzer;
//! use compliance_agent::narration::NarrationSink;
//! use compliance_agent::pipeline::{new_shared_state, PipelineCommand, PipelineOrchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let shared_state = new_shared_state();
//!
//!     let (command_tx, command_rx) = mpsc::channel(16);
//!     let orchestrator = PipelineOrchestrator::new(
//!         shared_state.clone(),
//!         Arc::new(GeminiAnalyzer::from_config(&config.gateway)),
//!         NarrationSink::from_config(&config.narration),
//!         config.pipeline.clone(),
//!     );
//!
//!     let pipeline = tokio::spawn(orchestrator.run(command_rx));
//!     command_tx.send(PipelineCommand::Start).await.unwrap();
//!     drop(command_tx);
//!     pipeline.await.unwrap();
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{
    persist_narration, PipelineCommand, PipelineOrchestrator, PipelineUpdate, RunOutcome,
};
pub use state::{current_phase, new_shared_state, AppState, PipelinePhase, SharedState};
