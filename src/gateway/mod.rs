//! Analysis gateway: markup in, accessibility/localisation issues out.
//!
//! This module provides:
//! * [`ComplianceAnalyzer`]: async trait the pipeline depends on.
//! * [`GeminiAnalyzer`]: Gemini `generateContent` backend with a
//!   structured-output response schema.
//! * [`AnalysisError`]: every way an analysis can fail.  The pipeline treats
//!   all variants alike: the run ends in `Error` and nothing is retried.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use compliance_agent::config::{AppConfig, DEMO_MARKUP};
//! use compliance_agent::gateway::{ComplianceAnalyzer, GeminiAnalyzer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let analyzer = GeminiAnalyzer::from_config(&config.gateway);
//!
//!     for issue in analyzer.analyze(DEMO_MARKUP).await.unwrap() {
//!         println!("[{}] {}", issue.severity, issue.title);
//!     }
//! }
//! ```

pub mod analyzer;
pub mod prompt;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use analyzer::{parse_findings, AnalysisError, ComplianceAnalyzer, GeminiAnalyzer};
pub use prompt::{build_prompt, response_schema};
