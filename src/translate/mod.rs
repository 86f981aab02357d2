//! Batch translation of nested JSON locale files.
//!
//! A source file (`en.json`) is flattened to dot-joined keys, every
//! non-empty string value is sent to the [`Translator`] in one batch per
//! target language, and the results are unflattened into `<code>.json`
//! next to it.  [`DeepLTranslator`] talks to the DeepL REST API.

pub mod deepl;
pub mod flatten;
pub mod runner;

pub use deepl::DeepLTranslator;
pub use flatten::{flatten, unflatten};
pub use runner::{translate_file, LanguageOutcome, TranslationReport};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TargetLanguage;

// ---------------------------------------------------------------------------
// TranslateError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("no DeepL auth key configured")]
    MissingAuthKey,

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("translation request timed out")]
    Timeout,

    #[error("DeepL returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("DeepL usage limit reached ({count}/{limit} characters)")]
    LimitReached { count: u64, limit: u64 },

    #[error("failed to parse DeepL response: {0}")]
    Parse(String),

    #[error("expected {expected} translations, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {reason}")]
    InvalidSource { path: String, reason: String },
}

impl From<reqwest::Error> for TranslateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranslateError::Timeout
        } else {
            TranslateError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Usage
// ---------------------------------------------------------------------------

/// Character quota for the current billing period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub character_count: u64,
    pub character_limit: u64,
}

impl Usage {
    /// A zero limit means the account reports no quota.
    pub fn limit_reached(&self) -> bool {
        self.character_limit > 0 && self.character_count >= self.character_limit
    }

    pub fn remaining(&self) -> u64 {
        self.character_limit.saturating_sub(self.character_count)
    }
}

// ---------------------------------------------------------------------------
// Translator trait
// ---------------------------------------------------------------------------

/// Machine translation backend.
///
/// `translate` returns exactly one string per input, in order.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target: &TargetLanguage,
    ) -> Result<Vec<String>, TranslateError>;

    async fn usage(&self) -> Result<Usage, TranslateError>;
}
