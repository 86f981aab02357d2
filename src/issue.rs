//! Accessibility / localisation findings.
//!
//! An [`Issue`] is created once per pipeline run, either by the analysis
//! gateway or as the constant [`Issue::not_translated`] finding, and always
//! starts in [`ResolutionStatus::Todo`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Id carried by the synthetic "Text Not Translated" issue.
pub const NOT_TRANSLATED_ID: &str = "manual-issue-1";

/// How urgent a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

/// Whether a finding is about accessibility or localisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Accessibility,
    Localization,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Accessibility, Category::Localization];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Accessibility => "Accessibility",
            Category::Localization => "Localization",
        }
    }
}

/// Kanban column of a finding.  Only `Todo` is produced in this crate; the
/// board moves issues along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

/// Returned when a severity or category string is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value {0:?}")]
pub struct UnknownVariant(pub String);

impl FromStr for Severity {
    type Err = UnknownVariant;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    /// Case-insensitive; also accepts the British spelling "Localisation".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("localisation") {
            return Ok(Category::Localization);
        }
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    #[serde(rename = "type")]
    pub category: Category,
    pub status: ResolutionStatus,
}

impl Issue {
    /// The constant finding appended to every successful analysis.
    pub fn not_translated() -> Self {
        Self {
            id: NOT_TRANSLATED_ID.into(),
            title: "Text Not Translated".into(),
            description: "Please translate your text into German, Japanese, French, and Arabic."
                .into(),
            severity: Severity::High,
            category: Category::Localization,
            status: ResolutionStatus::Todo,
        }
    }
}
