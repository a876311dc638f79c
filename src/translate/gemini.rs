//! Gemini-based translation using the Generative AI API.

use crate::error::{Result, SubtranslateError};
use crate::translate::{language_name, truncate_to_budget, Translation, Translator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Translator using Google Gemini API.
pub struct GeminiTranslator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    source_lang: String,
    max_input_tokens: usize,
}

impl GeminiTranslator {
    /// Create a new Gemini translator with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: "gemini-2.0-flash".to_string(),
            base_url: GEMINI_API_URL.to_string(),
            source_lang: "en".to_string(),
            max_input_tokens: 512,
        }
    }

    /// Set a different model (e.g., "gemini-1.5-pro").
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_source_language(mut self, lang: impl Into<String>) -> Self {
        self.source_lang = lang.into();
        self
    }

    /// Inputs longer than this many tokens are truncated before sending.
    pub fn with_max_input_tokens(mut self, max_tokens: usize) -> Self {
        self.max_input_tokens = max_tokens;
        self
    }

    fn build_prompt(&self, text: &str, target_lang: &str) -> String {
        format!(
            r#"Translate the following subtitle line from {} to {}.
Return ONLY the translated text, nothing else. Preserve line breaks.

Text to translate:
{}"#,
            prompt_language(&self.source_lang),
            prompt_language(target_lang),
            text
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponseContent {
    parts: Option<Vec<GeminiResponsePart>>,
}

#[derive(Deserialize, Debug)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[async_trait]
impl Translator for GeminiTranslator {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<Translation> {
        if text.trim().is_empty() {
            return Ok(Translation {
                text: String::new(),
                truncated: false,
            });
        }

        let (input, truncated) = truncate_to_budget(text, self.max_input_tokens);
        if truncated {
            warn!(
                "Input exceeds {} tokens, translating truncated text",
                self.max_input_tokens
            );
        }

        debug!("Translating {} chars to {}", input.len(), target_lang);

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: self.build_prompt(&input, target_lang),
                }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SubtranslateError::TranslationFailed(format!("Translation request failed: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            SubtranslateError::TranslationFailed(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            return Err(SubtranslateError::TranslationFailed(format!(
                "Translation API error ({}): {}",
                status, body
            )));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            SubtranslateError::TranslationFailed(format!(
                "Failed to parse translation response: {}",
                e
            ))
        })?;

        if let Some(error) = gemini_response.error {
            return Err(SubtranslateError::TranslationFailed(format!(
                "Gemini error: {}",
                error.message
            )));
        }

        let translated = gemini_response
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .and_then(|p| p.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                SubtranslateError::TranslationFailed("Gemini returned no candidates".to_string())
            })?;

        Ok(Translation {
            text: translated.trim().to_string(),
            truncated,
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Name used in the prompt; unlisted codes are passed through as ISO codes.
fn prompt_language(code: &str) -> String {
    language_name(code)
        .map(Into::into)
        .unwrap_or_else(|| format!("the language with ISO 639-1 code '{}'", code.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_translator_creation() {
        let translator = GeminiTranslator::new("test-key".to_string());
        assert_eq!(translator.name(), "gemini");
        assert_eq!(translator.model, "gemini-2.0-flash");
        assert_eq!(translator.max_input_tokens, 512);
    }

    #[test]
    fn test_endpoint() {
        let translator = GeminiTranslator::new("k".to_string())
            .with_model("gemini-1.5-pro")
            .with_base_url("http://localhost:9000/");
        assert_eq!(
            translator.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn test_build_prompt() {
        let translator = GeminiTranslator::new("test-key".to_string());
        let prompt = translator.build_prompt("Hello, world!", "ro");
        assert!(prompt.contains("from English to Romanian"));
        assert!(prompt.contains("Hello, world!"));
    }

    #[test]
    fn test_prompt_language() {
        assert_eq!(prompt_language("RO"), "Romanian");
        assert_eq!(
            prompt_language("vi"),
            "the language with ISO 639-1 code 'vi'"
        );
    }

    #[test]
    fn test_prompt_names_unlisted_target() {
        let translator = GeminiTranslator::new("test-key".to_string());
        let prompt = translator.build_prompt("Hello", "vi");
        assert!(prompt.contains("from English to the language with ISO 639-1 code 'vi'"));
    }

    #[tokio::test]
    async fn test_empty_input_skips_service() {
        // Unroutable base URL: any request would fail.
        let translator =
            GeminiTranslator::new("k".to_string()).with_base_url("http://127.0.0.1:1");
        let translation = translator.translate("   ", "ro").await.unwrap();
        assert_eq!(translation.text, "");
        assert!(!translation.truncated);
    }
}
