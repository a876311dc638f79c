pub mod gemini;

pub use gemini::GeminiTranslator;

use crate::error::Result;
use crate::transcribe::Segment;
use async_trait::async_trait;
use std::borrow::Cow;
use std::time::Duration;

/// Output of a single translation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    /// The input exceeded the token budget and only its head was translated.
    pub truncated: bool,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<Translation>;
    fn name(&self) -> &'static str;
}

/// A [`Segment`] whose text has been translated. Same index and timing.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedSegment {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub translated_text: String,
}

impl TranslatedSegment {
    pub fn new(segment: Segment, translated_text: String) -> Self {
        Self {
            index: segment.index,
            start: segment.start,
            end: segment.end,
            translated_text,
        }
    }
}

/// Languages offered for subtitles, by ISO 639-1 code.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("ro", "Romanian"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("hu", "Hungarian"),
    ("bg", "Bulgarian"),
    ("cs", "Czech"),
    ("el", "Greek"),
    ("sv", "Swedish"),
    ("tr", "Turkish"),
    ("ru", "Russian"),
    ("uk", "Ukrainian"),
    ("ar", "Arabic"),
    ("hi", "Hindi"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh", "Chinese"),
];

/// English name for a language code, if known.
pub fn language_name(code: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code.trim()))
        .map(|(_, name)| *name)
}

/// Keep at most `max_tokens` whitespace-delimited tokens of `text`.
///
/// Returns the (possibly shortened) text and whether anything was cut.
pub fn truncate_to_budget(text: &str, max_tokens: usize) -> (Cow<'_, str>, bool) {
    let mut tokens = text.split_whitespace();
    let kept: Vec<&str> = tokens.by_ref().take(max_tokens).collect();
    if tokens.next().is_none() {
        return (Cow::Borrowed(text), false);
    }
    (Cow::Owned(kept.join(" ")), true)
}

/// Returns the input unchanged. Used when source and target languages match.
#[derive(Debug, Clone, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str, _target_lang: &str) -> Result<Translation> {
        Ok(Translation {
            text: text.to_string(),
            truncated: false,
        })
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}
