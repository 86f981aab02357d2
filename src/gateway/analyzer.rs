//! Core `ComplianceAnalyzer` trait and `GeminiAnalyzer` implementation.
//!
//! `GeminiAnalyzer` calls the Gemini `generateContent` endpoint once per
//! analysis, asks for `application/json` constrained by
//! [`response_schema`](crate::gateway::response_schema), and parses the
//! returned text strictly.  Connection details come from [`GatewayConfig`];
//! the HTTP client is injected so one client serves the whole process.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::gateway::prompt::{build_prompt, response_schema};
use crate::issue::{Category, Issue, ResolutionStatus, Severity};

// ---------------------------------------------------------------------------
// AnalysisError
// ---------------------------------------------------------------------------

/// Errors that can occur during an analysis call.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The markup to analyse was empty.
    #[error("nothing to analyse: markup is empty")]
    EmptyMarkup,

    /// No API key was configured or found in the environment.
    #[error("no Gemini API key configured")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("analysis request timed out")]
    Timeout,

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider response contained no candidate text.
    #[error("provider returned an empty response")]
    EmptyResponse,

    /// The response text was not the expected JSON array.
    #[error("failed to parse analysis response: {0}")]
    Parse(String),

    /// A record parsed but violated the issue model.
    #[error("finding {index} is invalid: {reason}")]
    InvalidFinding { index: usize, reason: String },
}

impl From<reqwest::Error> for AnalysisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AnalysisError::Timeout
        } else {
            AnalysisError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ComplianceAnalyzer trait
// ---------------------------------------------------------------------------

/// Async trait for markup analysis backends.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn ComplianceAnalyzer>`.  A call either returns every finding or
/// fails as a whole.
#[async_trait]
pub trait ComplianceAnalyzer: Send + Sync {
    async fn analyze(&self, markup: &str) -> Result<Vec<Issue>, AnalysisError>;
}

// ---------------------------------------------------------------------------
// Finding parsing
// ---------------------------------------------------------------------------

/// One record as the model returns it, before validation.
#[derive(Debug, Deserialize)]
struct RawFinding {
    title: String,
    description: String,
    severity: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Parse the model's JSON text into issues.
///
/// Every record gets the id `issue-<stamp_millis>-<index>` and status
/// `Todo`.  Missing fields, empty title/description, or unknown
/// severity/type values reject the whole response.
pub fn parse_findings(text: &str, stamp_millis: i64) -> Result<Vec<Issue>, AnalysisError> {
    let raw: Vec<RawFinding> =
        serde_json::from_str(text.trim()).map_err(|e| AnalysisError::Parse(e.to_string()))?;

    raw.into_iter()
        .enumerate()
        .map(|(index, finding)| {
            let invalid = |reason: String| AnalysisError::InvalidFinding { index, reason };

            if finding.title.trim().is_empty() {
                return Err(invalid("empty title".into()));
            }
            if finding.description.trim().is_empty() {
                return Err(invalid("empty description".into()));
            }
            let severity: Severity = finding
                .severity
                .parse()
                .map_err(|e| invalid(format!("severity: {e}")))?;
            let category: Category = finding
                .kind
                .parse()
                .map_err(|e| invalid(format!("type: {e}")))?;

            Ok(Issue {
                id: format!("issue-{stamp_millis}-{index}"),
                title: finding.title,
                description: finding.description,
                severity,
                category,
                status: ResolutionStatus::Todo,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Gemini wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ---------------------------------------------------------------------------
// GeminiAnalyzer
// ---------------------------------------------------------------------------

/// Calls `{base_url}/v1beta/models/{model}:generateContent`.
pub struct GeminiAnalyzer {
    client: reqwest::Client,
    config: GatewayConfig,
    api_key: Option<String>,
}

impl GeminiAnalyzer {
    /// Wrap an existing client.  The API key is resolved once, here.
    pub fn new(client: reqwest::Client, config: GatewayConfig) -> Self {
        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            log::warn!(
                "gateway: no API key configured (set gateway.api_key or ${})",
                config.api_key_env
            );
        }
        Self {
            client,
            config,
            api_key,
        }
    }

    /// Build a client from `config.timeout_secs` and wrap it.
    ///
    /// A default client is used as a last resort if the builder fails.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let client = builder.build().unwrap_or_else(|_| reqwest::Client::new());
        Self::new(client, config.clone())
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ComplianceAnalyzer for GeminiAnalyzer {
    async fn analyze(&self, markup: &str) -> Result<Vec<Issue>, AnalysisError> {
        if markup.trim().is_empty() {
            return Err(AnalysisError::EmptyMarkup);
        }
        let key = self.api_key.as_deref().ok_or(AnalysisError::MissingApiKey)?;

        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": build_prompt(markup) } ] }
            ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema()
            }
        });

        log::debug!("gateway: requesting analysis from {}", self.config.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Parse(e.to_string()))?;

        let text = parsed.text().ok_or(AnalysisError::EmptyResponse)?;
        let issues = parse_findings(&text, chrono::Utc::now().timestamp_millis())?;

        log::info!("gateway: {} finding(s) returned", issues.len());
        Ok(issues)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
