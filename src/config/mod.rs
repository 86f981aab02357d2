//! Configuration module for the compliance agent.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for the platform settings file, and TOML persistence via
//! `AppConfig::load_from` / `AppConfig::save_to`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, GatewayConfig, KanbanConfig, NarrationConfig, PipelineConfig, TargetLanguage,
    TranslateConfig, VoiceConfig, DEMO_MARKUP,
};
