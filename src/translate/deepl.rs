//! DeepL REST client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::{TargetLanguage, TranslateConfig};

use super::{TranslateError, Translator, Usage};

const FREE_API: &str = "https://api-free.deepl.com";
const PRO_API: &str = "https://api.deepl.com";

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    #[serde(default)]
    detected_source_language: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    #[serde(default)]
    character_count: u64,
    #[serde(default)]
    character_limit: u64,
}

/// Calls `/v2/translate` and `/v2/usage`.
pub struct DeepLTranslator {
    client: reqwest::Client,
    base_url: String,
    auth_key: String,
}

impl DeepLTranslator {
    pub fn new(client: reqwest::Client, config: &TranslateConfig) -> Result<Self, TranslateError> {
        let auth_key = config
            .resolve_auth_key()
            .ok_or(TranslateError::MissingAuthKey)?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| Self::base_url_for(&auth_key).to_string());
        Ok(Self {
            client,
            base_url,
            auth_key,
        })
    }

    /// Build a client from `config.timeout_secs` and wrap it.
    pub fn from_config(config: &TranslateConfig) -> Result<Self, TranslateError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self::new(builder.build()?, config)
    }

    /// Free-plan keys end in `:fx`.
    pub fn base_url_for(auth_key: &str) -> &'static str {
        if auth_key.ends_with(":fx") {
            FREE_API
        } else {
            PRO_API
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/v2/{endpoint}", self.base_url.trim_end_matches('/'))
    }

    fn authorization(&self) -> String {
        format!("DeepL-Auth-Key {}", self.auth_key)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TranslateError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TranslateError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    async fn translate(
        &self,
        texts: &[String],
        source_lang: &str,
        target: &TargetLanguage,
    ) -> Result<Vec<String>, TranslateError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = serde_json::json!({
            "text": texts,
            "source_lang": source_lang,
            "target_lang": target.code,
            "tag_handling": "xml",
        });
        if let Some(formality) = &target.formality {
            body["formality"] = serde_json::Value::String(formality.clone());
        }

        log::debug!(
            "translate: sending {} string(s) to DeepL for {}",
            texts.len(),
            target.code
        );

        let response = self
            .client
            .post(self.url("translate"))
            .header("Authorization", self.authorization())
            .json(&body)
            .send()
            .await?;
        let parsed: TranslateResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| TranslateError::Parse(e.to_string()))?;

        if parsed.translations.len() != texts.len() {
            return Err(TranslateError::CountMismatch {
                expected: texts.len(),
                got: parsed.translations.len(),
            });
        }
        if let Some(detected) = parsed
            .translations
            .first()
            .and_then(|t| t.detected_source_language.as_deref())
        {
            log::debug!("translate: DeepL detected source language {detected}");
        }
        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }

    async fn usage(&self) -> Result<Usage, TranslateError> {
        let response = self
            .client
            .get(self.url("usage"))
            .header("Authorization", self.authorization())
            .send()
            .await?;
        let parsed: UsageResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| TranslateError::Parse(e.to_string()))?;
        Ok(Usage {
            character_count: parsed.character_count,
            character_limit: parsed.character_limit,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn translator_for(server: &MockServer) -> DeepLTranslator {
        let config = TranslateConfig {
            base_url: Some(server.uri()),
            auth_key: Some("secret:fx".into()),
            auth_key_env: "COMPLIANCE_AGENT_TEST_UNSET_VAR".into(),
            ..TranslateConfig::default()
        };
        DeepLTranslator::new(reqwest::Client::new(), &config).unwrap()
    }

    #[test]
    fn free_keys_use_free_endpoint() {
        assert_eq!(DeepLTranslator::base_url_for("abc:fx"), FREE_API);
        assert_eq!(DeepLTranslator::base_url_for("abc"), PRO_API);
    }

    #[test]
    fn configured_base_url_wins() {
        let config = TranslateConfig {
            base_url: Some("http://localhost:9999".into()),
            auth_key: Some("abc:fx".into()),
            ..TranslateConfig::default()
        };
        let translator = DeepLTranslator::new(reqwest::Client::new(), &config).unwrap();
        assert_eq!(translator.base_url(), "http://localhost:9999");
    }

    #[test]
    fn missing_key_is_an_error() {
        let config = TranslateConfig {
            auth_key: None,
            auth_key_env: "COMPLIANCE_AGENT_TEST_UNSET_VAR".into(),
            ..TranslateConfig::default()
        };
        assert!(matches!(
            DeepLTranslator::new(reqwest::Client::new(), &config),
            Err(TranslateError::MissingAuthKey)
        ));
    }

    #[tokio::test]
    async fn translate_sends_batch_with_formality() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(header("Authorization", "DeepL-Auth-Key secret:fx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translations": [
                    { "detected_source_language": "EN", "text": "إرسال" },
                    { "detected_source_language": "EN", "text": "مرحبا" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let translator = translator_for(&server);
        let target = TargetLanguage::new("AR", "Arabic").with_formality("prefer_more");
        let out = translator
            .translate(&["Submit".into(), "Hello".into()], "EN", &target)
            .await
            .unwrap();
        assert_eq!(out, ["إرسال", "مرحبا"]);

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["text"], serde_json::json!(["Submit", "Hello"]));
        assert_eq!(body["target_lang"], "AR");
        assert_eq!(body["tag_handling"], "xml");
        assert_eq!(body["formality"], "prefer_more");
    }

    #[tokio::test]
    async fn translate_without_formality_omits_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translations": [ { "text": "Hallo" } ]
            })))
            .mount(&server)
            .await;

        let translator = translator_for(&server);
        translator
            .translate(&["Hello".into()], "EN", &TargetLanguage::new("DE", "German"))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("formality").is_none());
    }

    #[tokio::test]
    async fn short_response_is_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "translations": [ { "text": "Hallo" } ]
            })))
            .mount(&server)
            .await;

        let err = translator_for(&server)
            .translate(
                &["Hello".into(), "World".into()],
                "EN",
                &TargetLanguage::new("DE", "German"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TranslateError::CountMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[tokio::test]
    async fn quota_exceeded_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(456).set_body_string("Quota exceeded"))
            .mount(&server)
            .await;

        let err = translator_for(&server)
            .translate(&["Hello".into()], "EN", &TargetLanguage::new("JA", "Japanese"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Status { status: 456, .. }));
    }

    #[tokio::test]
    async fn usage_reads_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/usage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "character_count": 1200,
                "character_limit": 500000
            })))
            .mount(&server)
            .await;

        let usage = translator_for(&server).usage().await.unwrap();
        assert_eq!(usage.character_count, 1200);
        assert_eq!(usage.remaining(), 498_800);
    }

    #[tokio::test]
    async fn slow_server_times_out_with_configured_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/usage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "character_count": 0,
                        "character_limit": 500000
                    }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = TranslateConfig {
            base_url: Some(server.uri()),
            auth_key: Some("secret:fx".into()),
            timeout_secs: Some(1),
            ..TranslateConfig::default()
        };
        let err = DeepLTranslator::from_config(&config)
            .unwrap()
            .usage()
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::Timeout));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        let out = translator_for(&server)
            .translate(&[], "EN", &TargetLanguage::new("FR", "French"))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
