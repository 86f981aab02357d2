//! Analysis prompt and structured-output schema.
//!
//! The response schema constrains the model to a JSON array of
//! `{title, description, severity, type}` objects, all required strings.
//! Severity and type additionally advertise their allowed values; the
//! gateway still validates them after parsing.

use serde_json::{json, Value};

use crate::issue::{Category, Severity};

const INSTRUCTION: &str = "\
You are an expert web accessibility (WCAG) and internationalization (i18n) agent.
Analyze the following HTML code snippet. Identify potential issues related to accessibility \
(like missing alt text on images) and internationalization/localization (like text in a \
fixed-width container that could cause overflow when translated to a longer language like German).

Return your findings as a JSON array of objects. Do not return any other text or markdown formatting.";

/// Build the natural-language instruction with `markup` embedded in an html fence.
pub fn build_prompt(markup: &str) -> String {
    format!("{INSTRUCTION}\n\nHere is the code:\n```html\n{}\n```", markup.trim())
}

/// Gemini `responseSchema` for the issue array.
pub fn response_schema() -> Value {
    let severities: Vec<&str> = Severity::ALL.iter().map(|s| s.as_str()).collect();
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();

    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": {
                    "type": "STRING",
                    "description": "A short, descriptive title for the issue."
                },
                "description": {
                    "type": "STRING",
                    "description": "A detailed explanation of the problem and why it's an issue."
                },
                "severity": {
                    "type": "STRING",
                    "description": "The severity of the issue: 'Critical', 'High', 'Medium', or 'Low'.",
                    "enum": severities
                },
                "type": {
                    "type": "STRING",
                    "description": "The type of issue: 'Accessibility' or 'Localization'.",
                    "enum": categories
                }
            },
            "required": ["title", "description", "severity", "type"]
        }
    })
}
