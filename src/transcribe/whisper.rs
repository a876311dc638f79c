use crate::config::{OPENAI_API_URL, OPENAI_WHISPER_MODEL};
use crate::error::{Result, SubtranslateError};
use crate::media::AudioTrack;
use crate::transcribe::{RecognizedSegment, SpeechRecognizer};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Maximum upload size accepted by the Whisper API (25 MB).
const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Languages the Whisper models were trained on (ISO 639-1).
const WHISPER_LANGUAGES: &[&str] = &[
    "af", "ar", "hy", "az", "be", "bs", "bg", "ca", "zh", "hr", "cs", "da", "nl", "en", "et",
    "fi", "fr", "gl", "de", "el", "he", "hi", "hu", "is", "id", "it", "ja", "kn", "kk", "ko",
    "lv", "lt", "mk", "ms", "mr", "mi", "ne", "no", "fa", "pl", "pt", "ro", "ru", "sr", "sk",
    "sl", "es", "sw", "sv", "tl", "ta", "th", "tr", "uk", "ur", "vi", "cy",
];

/// Client for OpenAI-compatible `/audio/transcriptions` endpoints.
pub struct WhisperClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperClient {
    /// Client for the hosted OpenAI API.
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_API_URL.to_string(),
            api_key: Some(api_key),
            model: OPENAI_WHISPER_MODEL.to_string(),
        }
    }

    /// Client for a self-hosted server (whisper.cpp, faster-whisper, ...).
    pub fn local(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: None,
            model: OPENAI_WHISPER_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }

    async fn build_form(&self, audio_path: &Path, language: &str) -> Result<Form> {
        let file_bytes = fs::read(audio_path).await.map_err(|e| {
            SubtranslateError::TranscriptionFailed(format!(
                "Cannot read audio {}: {e}",
                audio_path.display()
            ))
        })?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let mime_type = match audio_path.extension().and_then(|e| e.to_str()) {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") => "audio/ogg",
            _ => "application/octet-stream",
        };

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(mime_type)?;

        let form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        Ok(form)
    }

    async fn call_api(&self, form: Form) -> Result<WhisperResponse> {
        let mut request = self.client.post(self.endpoint()).multipart(form);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            SubtranslateError::TranscriptionFailed(format!("Whisper service unavailable: {e}"))
        })?;

        let status = response.status();
        debug!("Whisper API response status: {}", status);
        let body = response.text().await.map_err(|e| {
            SubtranslateError::TranscriptionFailed(format!("Failed to read response: {e}"))
        })?;

        if status.is_success() {
            debug!("Whisper API response: {}", log_preview(&body));
            return serde_json::from_str(&body).map_err(|e| {
                SubtranslateError::TranscriptionFailed(format!("Malformed Whisper response: {e}"))
            });
        }

        if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            return Err(SubtranslateError::TranscriptionFailed(format!(
                "Whisper API error: {} ({})",
                api_error.error.message, api_error.error.r#type
            )));
        }

        Err(SubtranslateError::TranscriptionFailed(format!(
            "Whisper API error ({}): {}",
            status, body
        )))
    }

    /// Convert the API response into recognizer segments, keeping service timing.
    fn parse_response(&self, response: WhisperResponse) -> Vec<RecognizedSegment> {
        match response.segments {
            Some(segments) => segments
                .into_iter()
                .map(|seg| RecognizedSegment {
                    start: secs(seg.start),
                    end: secs(seg.end),
                    text: seg.text.trim().to_string(),
                })
                .collect(),
            // Servers without segment output: one segment spanning the audio.
            None if !response.text.trim().is_empty() => vec![RecognizedSegment {
                start: Duration::ZERO,
                end: secs(response.duration.unwrap_or(0.0)),
                text: response.text.trim().to_string(),
            }],
            None => Vec::new(),
        }
    }
}

/// First 500 characters of a response body, cut on a char boundary.
fn log_preview(body: &str) -> &str {
    body.char_indices()
        .nth(500)
        .map_or(body, |(i, _)| &body[..i])
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or_default()
}

#[async_trait]
impl SpeechRecognizer for WhisperClient {
    async fn recognize(
        &self,
        audio: &AudioTrack,
        language: &str,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Vec<RecognizedSegment>> {
        let metadata = fs::metadata(&audio.path).await.map_err(|e| {
            SubtranslateError::TranscriptionFailed(format!(
                "Cannot read audio {}: {e}",
                audio.path.display()
            ))
        })?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(SubtranslateError::TranscriptionFailed(format!(
                "File too large for Whisper API: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_FILE_SIZE
            )));
        }

        let form = self.build_form(&audio.path, language).await?;
        let response = self.call_api(form).await?;
        let segments = self.parse_response(response);
        progress(1.0);

        debug!("Whisper returned {} segments", segments.len());
        Ok(segments)
    }

    fn name(&self) -> &'static str {
        "OpenAI Whisper"
    }

    fn supports_language(&self, language: &str) -> bool {
        WHISPER_LANGUAGES.contains(&language.to_lowercase().as_str())
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    r#type: String,
}
