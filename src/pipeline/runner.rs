//! Pipeline orchestrator: drives one compliance run at a time.
//!
//! [`PipelineOrchestrator`] owns the [`SharedState`] and responds to
//! [`PipelineCommand`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Run flow
//!
//! ```text
//! PipelineCommand::Start   (ignored while a run is in flight)
//!   └─▶ clear issues                                 [Translating]
//!         └─▶ hold translate_delay                   [CheckingCompliance]
//!               └─▶ analyzer.analyze(markup)
//!                     ├─ Err → narrate failure        [Error]
//!                     └─ Ok  → + synthetic issue, hold compliance_delay
//!                               └─▶ narrate count     [Persisting]
//!                                     └─▶ hold persist_delay  [Completed]
//!
//! PipelineCommand::ClearIssues
//!   └─▶ empty the issue list, phase untouched
//! ```
//!
//! Every phase transition is committed to the shared state before the next
//! suspension point, so the start guard always sees the real phase.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::gateway::ComplianceAnalyzer;
use crate::issue::Issue;
use crate::narration::NarrationSink;

use super::state::{AppState, PipelinePhase, SharedState};

// ---------------------------------------------------------------------------
// Task texts and narration
// ---------------------------------------------------------------------------

pub const TASK_TRANSLATING: &str = "Translating content with DeepL...";
pub const TASK_CHECKING: &str = "Analyzing for WCAG & L10N compliance...";
pub const TASK_PERSISTING: &str = "Syncing issues with Vibe Kanban...";
pub const TASK_COMPLETED: &str = "Workflow finished.";
pub const TASK_FAILED: &str = "An error occurred during compliance check.";

pub const SAY_STARTING: &str = "Starting localization and accessibility analysis.";
pub const SAY_CHECKING: &str =
    "Analyzing for accessibility, WCAG, internationalization, and localization compliance.";
pub const SAY_FAILED: &str = "An error occurred. Please check the console for details.";

/// Narration for the `Persisting` transition.
pub fn persist_narration(issue_count: usize) -> String {
    if issue_count > 0 {
        format!(
            "Analysis complete. {issue_count} issues found. Solve manually or sync with Vibe Kanban."
        )
    } else {
        "Analysis complete. No issues found.".to_string()
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Commands accepted by [`PipelineOrchestrator::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    /// Start a run if the pipeline is idle or terminal.
    Start,
    /// Empty the issue list.
    ClearIssues,
}

/// Progress published to the display surface.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineUpdate {
    PhaseChanged { phase: PipelinePhase, task: String },
    IssuesChanged(Vec<Issue>),
}

/// How a started run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed { issue_count: usize },
    Failed { message: String },
}

type RunFuture<'a> = Pin<Box<dyn Future<Output = RunOutcome> + Send + 'a>>;

enum Step {
    Command(Option<PipelineCommand>),
    Finished(RunOutcome),
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives the compliance pipeline.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use compliance_agent::config::AppConfig;
/// use compliance_agent::gateway::GeminiAnalyzer;
/// use compliance_agent::narration::NarrationSink;
/// use compliance_agent::pipeline::{new_shared_state, PipelineCommand, PipelineOrchestrator};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let orchestrator = PipelineOrchestrator::new(
///     new_shared_state(),
///     Arc::new(GeminiAnalyzer::from_config(&config.gateway)),
///     NarrationSink::from_config(&config.narration),
///     config.pipeline.clone(),
/// );
///
/// let (tx, rx) = tokio::sync::mpsc::channel(16);
/// tokio::spawn(orchestrator.run(rx));
/// tx.send(PipelineCommand::Start).await.unwrap();
/// # }
/// ```
pub struct PipelineOrchestrator {
    state: SharedState,
    analyzer: Arc<dyn ComplianceAnalyzer>,
    narrator: NarrationSink,
    config: PipelineConfig,
    updates: Option<mpsc::UnboundedSender<PipelineUpdate>>,
}

impl PipelineOrchestrator {
    pub fn new(
        state: SharedState,
        analyzer: Arc<dyn ComplianceAnalyzer>,
        narrator: NarrationSink,
        config: PipelineConfig,
    ) -> Self {
        Self {
            state,
            analyzer,
            narrator,
            config,
            updates: None,
        }
    }

    /// Publish phase and issue changes on `tx`.
    pub fn with_updates(mut self, tx: mpsc::UnboundedSender<PipelineUpdate>) -> Self {
        self.updates = Some(tx);
        self
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Serve commands until `commands` is closed and any in-flight run has
    /// finished.  Queued narration is cancelled when the orchestrator drops
    /// unless another clone of its sink is still alive.
    ///
    /// Commands keep being handled while a run is in flight: a `Start` hits
    /// the guard and is dropped, a `ClearIssues` takes effect immediately.
    pub async fn run(self, mut commands: mpsc::Receiver<PipelineCommand>) {
        let mut active: Option<RunFuture<'_>> = None;
        let mut open = true;

        while open || active.is_some() {
            let step = tokio::select! {
                cmd = commands.recv(), if open => Step::Command(cmd),
                outcome = async {
                    match active.as_mut() {
                        Some(run) => run.await,
                        None => std::future::pending().await,
                    }
                }, if active.is_some() => Step::Finished(outcome),
            };

            match step {
                Step::Command(None) => {
                    open = false;
                }
                Step::Command(Some(PipelineCommand::Start)) => {
                    if self.try_begin() {
                        active = Some(Box::pin(self.execute()));
                    }
                }
                Step::Command(Some(PipelineCommand::ClearIssues)) => {
                    self.clear_issues();
                }
                Step::Finished(outcome) => {
                    active = None;
                    log::debug!("pipeline: run finished: {outcome:?}");
                }
            }
        }

        log::info!("pipeline: command channel closed, orchestrator shutting down");
    }

    /// Let queued narration play out (bounded), then release the narrator.
    ///
    /// Dropping the orchestrator without this cuts off speech still queued,
    /// such as the final failure announcement.
    pub async fn shutdown(self) {
        self.narrator.finish().await;
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Start a run and drive it to a terminal phase.
    ///
    /// Returns `None` without touching any state when a run is already in
    /// flight.
    pub async fn start(&self) -> Option<RunOutcome> {
        if !self.try_begin() {
            return None;
        }
        Some(self.execute().await)
    }

    /// Empty the issue list.  The phase is left as it is.
    pub fn clear_issues(&self) {
        self.lock().issues.clear();
        log::debug!("pipeline: issues cleared");
        self.publish(PipelineUpdate::IssuesChanged(Vec::new()));
    }

    /// Guard plus the synchronous first step of a run.
    fn try_begin(&self) -> bool {
        {
            let mut st = self.lock();
            if !st.phase.can_start() {
                log::info!(
                    "pipeline: start ignored, run already in progress ({})",
                    st.phase.label()
                );
                return false;
            }
            st.issues.clear();
            st.error_message = None;
            st.phase = PipelinePhase::Translating;
            st.current_task = TASK_TRANSLATING.to_string();
        }

        log::info!("pipeline: run started");
        self.publish(PipelineUpdate::IssuesChanged(Vec::new()));
        self.publish_phase(PipelinePhase::Translating, TASK_TRANSLATING);
        self.narrator.speak(SAY_STARTING);
        true
    }

    async fn execute(&self) -> RunOutcome {
        tokio::time::sleep(self.config.translate_delay()).await;

        self.enter(PipelinePhase::CheckingCompliance, TASK_CHECKING);
        self.narrator.speak(SAY_CHECKING);

        let mut issues = match self.analyzer.analyze(&self.config.source_markup).await {
            Ok(found) => found,
            Err(e) => {
                let message = e.to_string();
                log::error!("pipeline: compliance check failed: {message}");
                {
                    let mut st = self.lock();
                    st.error_message = Some(message.clone());
                }
                self.enter(PipelinePhase::Error, TASK_FAILED);
                self.narrator.speak(SAY_FAILED);
                return RunOutcome::Failed { message };
            }
        };

        issues.push(Issue::not_translated());
        let issue_count = issues.len();
        self.lock().issues = issues.clone();
        self.publish(PipelineUpdate::IssuesChanged(issues));

        tokio::time::sleep(self.config.compliance_delay()).await;

        self.enter(PipelinePhase::Persisting, TASK_PERSISTING);
        self.narrator.speak(&persist_narration(issue_count));

        tokio::time::sleep(self.config.persist_delay()).await;

        self.enter(PipelinePhase::Completed, TASK_COMPLETED);
        log::info!("pipeline: run completed with {issue_count} issue(s)");
        RunOutcome::Completed { issue_count }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, phase: PipelinePhase, task: &str) {
        {
            let mut st = self.lock();
            st.phase = phase;
            st.current_task = task.to_string();
        }
        log::debug!("pipeline: → {}", phase.label());
        self.publish_phase(phase, task);
    }

    fn publish_phase(&self, phase: PipelinePhase, task: &str) {
        self.publish(PipelineUpdate::PhaseChanged {
            phase,
            task: task.to_string(),
        });
    }

    fn publish(&self, update: PipelineUpdate) {
        if let Some(tx) = &self.updates {
            // The display may have gone away; the run does not depend on it.
            let _ = tx.send(update);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
