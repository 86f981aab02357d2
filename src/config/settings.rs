//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a hand-written `settings.toml`
//! only needs the keys it wants to override.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};


/// Markup scanned by the compliance-check phase when no repository
/// integration provides a real snippet.  Contains deliberate accessibility
/// and localisation defects.
pub const DEMO_MARKUP: &str = r#"
<div class="p-4 border rounded-lg">
  <img src="https://picsum.photos/300/150" />
  <button class="bg-blue-500 text-white font-bold py-2 px-4 rounded" style="width: 120px;">
    Submit Application
  </button>
  <p>Please click the button to proceed. This action is final.</p>
</div>
"#;

/// Reads `key` from the environment, treating an empty value as unset.
fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Settings for the Gemini analysis gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the Generative Language API.
    pub base_url: String,
    /// Model identifier (e.g. `"gemini-2.5-flash"`).
    pub model: String,
    /// API key.  When `None` or empty, `api_key_env` is consulted.
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-request timeout.  `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-2.5-flash".into(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".into(),
            timeout_secs: None,
        }
    }
}

impl GatewayConfig {
    /// The configured key, or the value of `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| non_empty_env(&self.api_key_env))
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Simulated-latency holds and the scanned markup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hold after entering `Translating`, in milliseconds.
    pub translate_delay_ms: u64,
    /// Hold after the compliance check succeeds, in milliseconds.
    pub compliance_delay_ms: u64,
    /// Hold after entering `Persisting`, in milliseconds.
    pub persist_delay_ms: u64,
    /// Markup handed to the analysis gateway.
    pub source_markup: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            translate_delay_ms: 2_000,
            compliance_delay_ms: 1_500,
            persist_delay_ms: 1_500,
            source_markup: DEMO_MARKUP.into(),
        }
    }
}

impl PipelineConfig {
    pub fn translate_delay(&self) -> Duration {
        Duration::from_millis(self.translate_delay_ms)
    }

    pub fn compliance_delay(&self) -> Duration {
        Duration::from_millis(self.compliance_delay_ms)
    }

    pub fn persist_delay(&self) -> Duration {
        Duration::from_millis(self.persist_delay_ms)
    }

    /// Same markup, no holds.  Used by tests and dry runs.
    pub fn without_delays() -> Self {
        Self {
            translate_delay_ms: 0,
            compliance_delay_ms: 0,
            persist_delay_ms: 0,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// NarrationConfig
// ---------------------------------------------------------------------------

/// Spoken progress narration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    /// `false` disables narration even when a synthesiser is installed.
    pub enabled: bool,
    /// Speech rate relative to the synthesiser's normal speed.
    pub rate: f32,
    /// Explicit text-to-speech program.  `None` searches `PATH` for a known one.
    pub program: Option<String>,
    /// How long shutdown waits for queued speech before cutting it off.
    pub finish_timeout_secs: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: 1.1,
            program: None,
            finish_timeout_secs: 15,
        }
    }
}

impl NarrationConfig {
    pub fn finish_timeout(&self) -> Duration {
        Duration::from_secs(self.finish_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// VoiceConfig
// ---------------------------------------------------------------------------

/// Voice command recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// BCP-47 locale tag of the recogniser.
    pub language: String,
    /// Lower-case phrases that start the pipeline when contained in a
    /// recognised utterance.
    pub trigger_phrases: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            trigger_phrases: vec!["start analysis".into(), "run pipeline".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// KanbanConfig
// ---------------------------------------------------------------------------

/// Location of the externally-run kanban board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KanbanConfig {
    pub board_url: String,
}

impl Default for KanbanConfig {
    fn default() -> Self {
        Self {
            board_url:
                "http://127.0.0.1:51515/projects/0d051836-b5ba-4eb8-841c-9798b559a848/tasks"
                    .into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranslateConfig
// ---------------------------------------------------------------------------

/// A translation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetLanguage {
    /// DeepL language code (e.g. `"DE"`).  The output file is
    /// `<code lowercase>.json`.
    pub code: String,
    /// Display name used in log output.
    pub name: String,
    /// DeepL formality preference, if any (e.g. `"prefer_more"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formality: Option<String>,
}

impl TargetLanguage {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            formality: None,
        }
    }

    pub fn with_formality(mut self, formality: &str) -> Self {
        self.formality = Some(formality.into());
        self
    }

    pub fn output_file_name(&self) -> String {
        format!("{}.json", self.code.to_lowercase())
    }
}

/// Settings for the one-shot locale file translator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// DeepL API base URL.  `None` picks the free or pro endpoint from the key.
    pub base_url: Option<String>,
    /// DeepL authentication key.  When `None` or empty, `auth_key_env` is
    /// consulted.
    pub auth_key: Option<String>,
    /// Environment variable holding the DeepL key.
    pub auth_key_env: String,
    /// Source JSON file.
    pub source_file: String,
    /// Source language code.
    pub source_lang: String,
    /// Directory the `<code>.json` files are written to.
    pub output_dir: String,
    /// Languages to translate into.
    pub targets: Vec<TargetLanguage>,
    /// Per-request timeout for DeepL calls.  `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_key: None,
            auth_key_env: "DEEPL_AUTH_KEY".into(),
            source_file: "en.json".into(),
            source_lang: "EN".into(),
            output_dir: ".".into(),
            targets: vec![
                TargetLanguage::new("DE", "German"),
                TargetLanguage::new("JA", "Japanese"),
                TargetLanguage::new("FR", "French"),
                TargetLanguage::new("AR", "Arabic").with_formality("prefer_more"),
            ],
            timeout_secs: None,
        }
    }
}

impl TranslateConfig {
    /// The configured key, or the value of `auth_key_env`.
    pub fn resolve_auth_key(&self) -> Option<String> {
        self.auth_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| non_empty_env(&self.auth_key_env))
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use compliance_agent::config::{AppConfig, AppPaths};
///
/// let path = AppPaths::new().settings_file;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load_from(&path)?;
///
/// // Modify and save
/// config.save_to(&path)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Analysis gateway settings.
    pub gateway: GatewayConfig,
    /// Phase holds and scanned markup.
    pub pipeline: PipelineConfig,
    /// Narration settings.
    pub narration: NarrationConfig,
    /// Voice command settings.
    pub voice: VoiceConfig,
    /// Kanban board location.
    pub kanban: KanbanConfig,
    /// Locale file translation settings.
    pub translate: TranslateConfig,
}

impl AppConfig {
    /// Load from `path`, returning `Ok(AppConfig::default())` when the file
    /// does not exist yet.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
