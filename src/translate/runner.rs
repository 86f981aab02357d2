//! Translate one source file into every target language.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::TargetLanguage;

use super::flatten::{flatten, unflatten};
use super::{TranslateError, Translator, Usage};

/// What happened for one target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageOutcome {
    Written {
        code: String,
        path: PathBuf,
        strings: usize,
    },
    /// The source has no non-empty strings.
    Skipped { code: String },
    Failed { code: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationReport {
    pub usage: Usage,
    pub outcomes: Vec<LanguageOutcome>,
}

impl TranslationReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, LanguageOutcome::Written { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, LanguageOutcome::Failed { .. }))
            .count()
    }
}

/// Translate `source` into `<out_dir>/<code>.json` for each target.
///
/// An unreadable or malformed source, a failed usage check, or an exhausted
/// quota abort the whole run.  A failure for one language is logged and
/// recorded, and the remaining languages still run.
pub async fn translate_file(
    translator: &dyn Translator,
    source: &Path,
    out_dir: &Path,
    targets: &[TargetLanguage],
    source_lang: &str,
) -> Result<TranslationReport, TranslateError> {
    let usage = translator.usage().await?;
    if usage.limit_reached() {
        return Err(TranslateError::LimitReached {
            count: usage.character_count,
            limit: usage.character_limit,
        });
    }
    log::info!(
        "translate: DeepL key is valid, {} character(s) remaining this period",
        usage.remaining()
    );

    let document = load_source(source).await?;
    log::info!("translate: loaded source file {}", source.display());

    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| TranslateError::Io {
            path: out_dir.display().to_string(),
            source: e,
        })?;

    let flat = flatten(&document);
    let (keys, texts): (Vec<String>, Vec<String>) = flat
        .iter()
        .filter_map(|(key, value)| {
            let text = value.as_str().filter(|s| !s.trim().is_empty())?;
            Some((key.clone(), text.to_string()))
        })
        .unzip();

    let mut outcomes = Vec::with_capacity(targets.len());
    for target in targets {
        log::info!("translate: --- {} ({}) ---", target.name, target.code);

        if texts.is_empty() {
            log::warn!("translate: no strings to translate, skipping {}", target.code);
            outcomes.push(LanguageOutcome::Skipped {
                code: target.code.clone(),
            });
            continue;
        }

        let written =
            translate_one(translator, &flat, &keys, &texts, source_lang, target, out_dir).await;
        let outcome = match written {
            Ok(path) => {
                log::info!("translate: saved {}", path.display());
                LanguageOutcome::Written {
                    code: target.code.clone(),
                    path,
                    strings: texts.len(),
                }
            }
            Err(e) => {
                log::error!("translate: {} failed: {e}", target.name);
                LanguageOutcome::Failed {
                    code: target.code.clone(),
                    error: e.to_string(),
                }
            }
        };
        outcomes.push(outcome);
    }

    Ok(TranslationReport { usage, outcomes })
}

async fn load_source(source: &Path) -> Result<Value, TranslateError> {
    let content = tokio::fs::read_to_string(source)
        .await
        .map_err(|e| TranslateError::Io {
            path: source.display().to_string(),
            source: e,
        })?;
    let document: Value =
        serde_json::from_str(&content).map_err(|e| TranslateError::InvalidSource {
            path: source.display().to_string(),
            reason: e.to_string(),
        })?;
    if !document.is_object() {
        return Err(TranslateError::InvalidSource {
            path: source.display().to_string(),
            reason: "top level must be an object".into(),
        });
    }
    Ok(document)
}

async fn translate_one(
    translator: &dyn Translator,
    flat: &Map<String, Value>,
    keys: &[String],
    texts: &[String],
    source_lang: &str,
    target: &TargetLanguage,
    out_dir: &Path,
) -> Result<PathBuf, TranslateError> {
    let translated = translator.translate(texts, source_lang, target).await?;
    if translated.len() != texts.len() {
        return Err(TranslateError::CountMismatch {
            expected: texts.len(),
            got: translated.len(),
        });
    }

    let mut result = flat.clone();
    for (key, text) in keys.iter().zip(translated) {
        result.insert(key.clone(), Value::String(text));
    }

    let path = out_dir.join(target.output_file_name());
    let bytes = to_pretty_json(&unflatten(&result))?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| TranslateError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
    Ok(path)
}

/// Four-space indented JSON, non-ASCII left as is.
fn to_pretty_json(value: &Value) -> Result<Vec<u8>, TranslateError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| TranslateError::Parse(e.to_string()))?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
