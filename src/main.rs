//! Application entry point: compliance agent CLI.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line.
//! 3. Load [`AppConfig`] (defaults when the file is missing).
//! 4. Dispatch the subcommand.  Each HTTP client is built from its own
//!    section's timeout:
//!    * `run`: one pipeline run, rendered to the console.
//!    * `listen`: wait for a trigger phrase, run, repeat.
//!    * `translate`: DeepL batch translation of the locale source file.
//!    * `config`: print (and optionally create) the settings file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use compliance_agent::{
    config::{AppConfig, AppPaths, TargetLanguage},
    gateway::{ComplianceAnalyzer, GeminiAnalyzer},
    issue::Issue,
    narration::NarrationSink,
    pipeline::{
        current_phase, new_shared_state, PipelineOrchestrator, PipelinePhase, PipelineUpdate,
        RunOutcome, SharedState,
    },
    translate::{translate_file, DeepLTranslator, LanguageOutcome},
    voice::{ConsoleRecognizer, RecognitionEvent, SpeechRecognizer, VoiceCommandListener},
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "compliance-agent",
    version,
    about = "Voice-driven localisation and accessibility compliance agent",
    arg_required_else_help = true
)]
struct Cli {
    /// Settings file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the compliance pipeline once
    Run,
    /// Wait for a trigger phrase on the terminal, then run
    Listen,
    /// Translate the locale source file with DeepL
    Translate {
        #[arg(long, help = "Source JSON file (default: translate.source_file)")]
        source: Option<PathBuf>,
        #[arg(long, help = "Output directory (default: translate.output_dir)")]
        out_dir: Option<PathBuf>,
        #[arg(long = "lang", help = "Target language code; repeatable (default: all configured)")]
        langs: Vec<String>,
    },
    /// Print the effective settings
    Config {
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Write defaults if the file does not exist")]
        init: bool,
    },
}

// ---------------------------------------------------------------------------
// Console rendering
// ---------------------------------------------------------------------------

fn format_issue(issue: &Issue) -> String {
    format!(
        "  [{:<8}] {:<13} {}\n             {}",
        issue.severity.as_str(),
        issue.category.as_str(),
        issue.title,
        issue.description
    )
}

/// Print pipeline updates until the orchestrator goes away.
///
/// Every terminal phase is also forwarded on `finished`, so a caller can wait
/// for the end of a run without polling the shared state.
async fn render(
    mut updates: mpsc::UnboundedReceiver<PipelineUpdate>,
    board_url: String,
    finished: Option<mpsc::UnboundedSender<PipelinePhase>>,
) {
    while let Some(update) = updates.recv().await {
        match update {
            PipelineUpdate::PhaseChanged { phase, task } => {
                println!("[{}] {}", phase.label(), task);
                if phase == PipelinePhase::Completed {
                    println!("Sync with Vibe Kanban: {board_url}");
                }
                if phase.is_terminal() {
                    if let Some(tx) = &finished {
                        let _ = tx.send(phase);
                    }
                }
            }
            PipelineUpdate::IssuesChanged(issues) if !issues.is_empty() => {
                println!("Found {} issue(s):", issues.len());
                for issue in &issues {
                    println!("{}", format_issue(issue));
                }
            }
            PipelineUpdate::IssuesChanged(_) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn build_orchestrator(
    config: &AppConfig,
    state: SharedState,
    narrator: NarrationSink,
) -> (PipelineOrchestrator, mpsc::UnboundedReceiver<PipelineUpdate>) {
    let analyzer: Arc<dyn ComplianceAnalyzer> =
        Arc::new(GeminiAnalyzer::from_config(&config.gateway));
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    let orchestrator =
        PipelineOrchestrator::new(state, analyzer, narrator, config.pipeline.clone())
            .with_updates(update_tx);
    (orchestrator, update_rx)
}

async fn run_once(config: &AppConfig) -> anyhow::Result<()> {
    let narrator = NarrationSink::from_config(&config.narration);
    let (orchestrator, update_rx) = build_orchestrator(config, new_shared_state(), narrator);
    let renderer = tokio::spawn(render(update_rx, config.kanban.board_url.clone(), None));

    let outcome = orchestrator.start().await;
    // Lets the last announcement play, then closes the update channel.
    orchestrator.shutdown().await;
    renderer.await?;

    match outcome {
        Some(RunOutcome::Failed { message }) => bail!("compliance check failed: {message}"),
        _ => Ok(()),
    }
}

async fn listen(config: &AppConfig) -> anyhow::Result<()> {
    let state = new_shared_state();
    // Kept here so the run loop exiting does not cut off the last narration.
    let narrator = NarrationSink::from_config(&config.narration);
    let (orchestrator, update_rx) = build_orchestrator(config, state.clone(), narrator.clone());
    let (command_tx, command_rx) = mpsc::channel(16);
    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel();
    let pipeline = tokio::spawn(orchestrator.run(command_rx));
    let renderer = tokio::spawn(render(
        update_rx,
        config.kanban.board_url.clone(),
        Some(finished_tx),
    ));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let recognizer = ConsoleRecognizer::detect(event_tx, &config.voice.language)
        .map(|r| Arc::new(r) as Arc<dyn SpeechRecognizer>);
    let mut listener = VoiceCommandListener::new(recognizer, &config.voice, command_tx);
    if !listener.is_enabled() {
        bail!("voice control needs an interactive terminal");
    }

    println!(
        "Say one of: {} (Ctrl-C to quit)",
        config.voice.trigger_phrases.join(", ")
    );

    let mut interrupted = false;
    'sessions: loop {
        if !listener.toggle(current_phase(&state)) {
            break;
        }

        let mut heard = false;
        let mut dispatched = false;
        loop {
            let event = tokio::select! {
                event = event_rx.recv() => event,
                _ = tokio::signal::ctrl_c() => {
                    interrupted = true;
                    break 'sessions;
                }
            };
            let Some(event) = event else {
                break 'sessions;
            };
            let ended = event == RecognitionEvent::Ended;
            heard |= matches!(event, RecognitionEvent::Result(_));
            dispatched |= listener.handle_event(event).is_some();
            if ended {
                break;
            }
        }

        if dispatched {
            // One terminal phase per accepted start.
            tokio::select! {
                phase = finished_rx.recv() => {
                    log::debug!("listen: run ended in {phase:?}");
                }
                _ = tokio::signal::ctrl_c() => {
                    interrupted = true;
                    break;
                }
            }
        } else if heard {
            println!("Not a command. Try: {}", config.voice.trigger_phrases.join(", "));
        }
    }

    // Dropping the listener closes the command channel; the run loop then
    // finishes any in-flight run and returns.
    drop(listener);
    pipeline.await?;
    // End of input lets queued speech finish; Ctrl-C cuts it off on drop.
    if !interrupted {
        narrator.finish().await;
    }
    drop(narrator);
    renderer.await?;
    Ok(())
}

fn select_targets(configured: &[TargetLanguage], codes: &[String]) -> Vec<TargetLanguage> {
    if codes.is_empty() {
        return configured.to_vec();
    }
    codes
        .iter()
        .map(|code| {
            configured
                .iter()
                .find(|t| t.code.eq_ignore_ascii_case(code))
                .cloned()
                .unwrap_or_else(|| TargetLanguage::new(&code.to_uppercase(), code))
        })
        .collect()
}

async fn translate(
    config: &AppConfig,
    source: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    langs: Vec<String>,
) -> anyhow::Result<()> {
    let settings = &config.translate;
    let source = source.unwrap_or_else(|| PathBuf::from(&settings.source_file));
    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(&settings.output_dir));
    let targets = select_targets(&settings.targets, &langs);

    let translator = DeepLTranslator::from_config(settings)?;
    let report = translate_file(&translator, &source, &out_dir, &targets, &settings.source_lang)
        .await
        .with_context(|| format!("translating {}", source.display()))?;

    for outcome in &report.outcomes {
        match outcome {
            LanguageOutcome::Written { path, strings, .. } => {
                println!("✅ {} string(s) -> {}", strings, path.display())
            }
            LanguageOutcome::Skipped { code } => println!("⏭  {code}: nothing to translate"),
            LanguageOutcome::Failed { code, error } => println!("❌ {code}: {error}"),
        }
    }

    println!("{} written, {} failed", report.written(), report.failed());
    if report.failed() > 0 {
        bail!(
            "{} of {} language(s) failed",
            report.failed(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn show_config(config: &AppConfig, path: &Path, init: bool) -> anyhow::Result<()> {
    if init && !path.exists() {
        config.save_to(path)?;
        log::info!("config: wrote defaults to {}", path.display());
    }
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line
    let cli = Cli::parse();

    // 3. Configuration
    let settings_path = cli
        .config
        .unwrap_or_else(|| AppPaths::new().settings_file);
    let config = AppConfig::load_from(&settings_path).unwrap_or_else(|e| {
        log::warn!("Failed to load config from {} ({e}); using defaults", settings_path.display());
        AppConfig::default()
    });

    // 4. Dispatch
    match cli.command {
        Command::Run => run_once(&config).await,
        Command::Listen => listen(&config).await,
        Command::Translate {
            source,
            out_dir,
            langs,
        } => translate(&config, source, out_dir, langs).await,
        Command::Config { init } => show_config(&config, &settings_path, init),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
