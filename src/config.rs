use crate::error::{Result, SubtranslateError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hosted OpenAI endpoint; requires an API key.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// The only Whisper model id the hosted endpoint accepts.
pub const OPENAI_WHISPER_MODEL: &str = "whisper-1";

/// Recognition model capacity. Larger models are slower but more accurate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    #[default]
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// Model identifier sent to self-hosted transcription servers.
    pub fn model_id(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "whisper-tiny",
            ModelSize::Base => "whisper-base",
            ModelSize::Small => "whisper-small",
            ModelSize::Medium => "whisper-medium",
            ModelSize::Large => "whisper-large",
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSize::Tiny => write!(f, "tiny"),
            ModelSize::Base => write!(f, "base"),
            ModelSize::Small => write!(f, "small"),
            ModelSize::Medium => write!(f, "medium"),
            ModelSize::Large => write!(f, "large"),
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(format!(
                "Unknown model size: {}. Use 'tiny', 'base', 'small', 'medium' or 'large'",
                s
            )),
        }
    }
}

/// What to do when the derived subtitle path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Replace the existing file without asking.
    #[default]
    Overwrite,
    /// Refuse to replace a file whose content differs from the new output.
    Fail,
}

impl std::fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverwritePolicy::Overwrite => write!(f, "overwrite"),
            OverwritePolicy::Fail => write!(f, "fail"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_size: ModelSize,
    pub source_language: String,
    pub target_language: String,
    /// Base URL of an OpenAI-compatible transcription endpoint.
    pub whisper_url: String,
    /// Overrides the model id derived from `whisper_url` and `model_size`.
    pub transcription_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub translation_model: String,
    pub max_translation_tokens: usize,
    pub overwrite: OverwritePolicy,
    /// Keep the extracted audio track after a successful run.
    pub keep_audio: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_size: ModelSize::default(),
            source_language: "en".to_string(),
            target_language: "ro".to_string(),
            whisper_url: OPENAI_API_URL.to_string(),
            transcription_model: None,
            openai_api_key: None,
            gemini_api_key: None,
            translation_model: "gemini-2.0-flash".to_string(),
            max_translation_tokens: 512,
            overwrite: OverwritePolicy::default(),
            keep_audio: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    SubtranslateError::Config(format!(
                        "Failed to parse {}: {}",
                        config_path.display(),
                        e
                    ))
                })?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.gemini_api_key = Some(key);
        }
        if let Ok(size) = std::env::var("SUBTRANSLATE_MODEL_SIZE") {
            if let Ok(s) = size.parse() {
                self.model_size = s;
            }
        }
        if let Ok(lang) = std::env::var("SUBTRANSLATE_SOURCE_LANGUAGE") {
            self.source_language = lang;
        }
        if let Ok(lang) = std::env::var("SUBTRANSLATE_TARGET_LANGUAGE") {
            self.target_language = lang;
        }
        if let Ok(url) = std::env::var("SUBTRANSLATE_WHISPER_URL") {
            self.whisper_url = url;
        }
    }

    /// Translation is skipped when both languages are the same.
    pub fn needs_translation(&self) -> bool {
        !self
            .source_language
            .eq_ignore_ascii_case(&self.target_language)
    }

    pub fn uses_hosted_whisper(&self) -> bool {
        self.whisper_url.starts_with(OPENAI_API_URL)
    }

    /// Model id sent to the transcription endpoint. The hosted API has a
    /// single Whisper model, so `model_size` only applies to self-hosted
    /// servers.
    pub fn transcription_model_id(&self) -> String {
        if let Some(ref model) = self.transcription_model {
            return model.clone();
        }
        if self.uses_hosted_whisper() {
            OPENAI_WHISPER_MODEL.to_string()
        } else {
            self.model_size.model_id().to_string()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_language.trim().is_empty() {
            return Err(SubtranslateError::Config(
                "Source language must not be empty".to_string(),
            ));
        }
        if self.target_language.trim().is_empty() {
            return Err(SubtranslateError::Config(
                "Target language must not be empty".to_string(),
            ));
        }
        if self.max_translation_tokens == 0 {
            return Err(SubtranslateError::Config(
                "max_translation_tokens must be greater than 0".to_string(),
            ));
        }
        if self.uses_hosted_whisper() && self.openai_api_key.is_none() {
            return Err(SubtranslateError::Config(
                "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-..."
                    .to_string(),
            ));
        }
        if self.needs_translation() && self.gemini_api_key.is_none() {
            return Err(SubtranslateError::Config(
                "GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("subtranslate").join("config.toml"))
    }
}
