pub mod whisper;

pub use whisper::WhisperClient;

use crate::error::{Result, SubtranslateError};
use crate::media::AudioTrack;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Segment as emitted by a recognition service, before indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSegment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// A timed piece of transcribed speech.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 1-based, ascending in emission order.
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub source_text: String,
}

/// External speech-recognition service.
///
/// `progress` receives the fraction (0.0 to 1.0) of audio processed so far.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn recognize(
        &self,
        audio: &AudioTrack,
        language: &str,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Vec<RecognizedSegment>>;

    fn name(&self) -> &'static str;

    fn supports_language(&self, language: &str) -> bool;
}

/// Adapts a recognizer's output into indexed [`Segment`]s.
///
/// The recognizer is loaded once by the caller and shared across runs.
#[derive(Clone)]
pub struct Transcriber {
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl Transcriber {
    pub fn new(recognizer: Box<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer: Arc::from(recognizer),
        }
    }

    pub fn recognizer_name(&self) -> &'static str {
        self.recognizer.name()
    }

    pub async fn transcribe(&self, audio: &AudioTrack, language: &str) -> Result<Vec<Segment>> {
        self.transcribe_with_progress(audio, language, &|_: f64| {}).await
    }

    pub async fn transcribe_with_progress(
        &self,
        audio: &AudioTrack,
        language: &str,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Vec<Segment>> {
        if !self.recognizer.supports_language(language) {
            return Err(SubtranslateError::TranscriptionFailed(format!(
                "Language '{}' is not supported by {}",
                language,
                self.recognizer.name()
            )));
        }

        info!(
            "Transcribing {} with {} (language: {})",
            audio.path.display(),
            self.recognizer.name(),
            language
        );

        let recognized = self
            .recognizer
            .recognize(audio, language, progress)
            .await
            .map_err(|e| match e {
                SubtranslateError::TranscriptionFailed(_) => e,
                other => SubtranslateError::TranscriptionFailed(other.to_string()),
            })?;

        let segments = index_segments(recognized);
        debug!("{} segments recognized", segments.len());
        Ok(segments)
    }
}

/// Assign 1-based indices in emission order.
fn index_segments(recognized: Vec<RecognizedSegment>) -> Vec<Segment> {
    recognized
        .into_iter()
        .enumerate()
        .map(|(i, seg)| {
            let end = if seg.end < seg.start {
                warn!(
                    "Segment {} ends before it starts ({:?} < {:?}), clamping",
                    i + 1,
                    seg.end,
                    seg.start
                );
                seg.start
            } else {
                seg.end
            };
            Segment {
                index: i + 1,
                start: seg.start,
                end,
                source_text: seg.text.trim().to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockRecognizer {
        segments: Vec<RecognizedSegment>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MockRecognizer {
        fn returning(segments: Vec<RecognizedSegment>) -> Self {
            Self {
                segments,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for MockRecognizer {
        async fn recognize(
            &self,
            _audio: &AudioTrack,
            _language: &str,
            progress: &(dyn Fn(f64) + Send + Sync),
        ) -> Result<Vec<RecognizedSegment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SubtranslateError::Io(std::io::Error::other("unreadable")));
            }
            progress(1.0);
            Ok(self.segments.clone())
        }

        fn name(&self) -> &'static str {
            "Mock"
        }

        fn supports_language(&self, language: &str) -> bool {
            language == "en"
        }
    }

    fn track() -> AudioTrack {
        AudioTrack {
            path: PathBuf::from("/tmp/talk.wav"),
            passthrough: false,
            metadata: None,
        }
    }

    fn recognized(start: u64, end: u64, text: &str) -> RecognizedSegment {
        RecognizedSegment {
            start: Duration::from_secs(start),
            end: Duration::from_secs(end),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_assigns_one_based_indices() {
        let transcriber = Transcriber::new(Box::new(MockRecognizer::returning(vec![
            recognized(0, 2, " Hello"),
            recognized(2, 5, "World "),
        ])));

        let segments = transcriber.transcribe(&track(), "en").await.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].index, 1);
        assert_eq!(segments[0].source_text, "Hello");
        assert_eq!(segments[1].index, 2);
        assert_eq!(segments[1].start, Duration::from_secs(2));
        assert_eq!(segments[1].end, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_speech_is_empty_not_error() {
        let transcriber = Transcriber::new(Box::new(MockRecognizer::returning(vec![])));
        let segments = transcriber.transcribe(&track(), "en").await.unwrap();
        assert!(segments.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let recognizer = MockRecognizer::returning(vec![]);
        let transcriber = Transcriber::new(Box::new(recognizer));
        let result = transcriber.transcribe(&track(), "xx").await;
        assert!(matches!(result, Err(SubtranslateError::TranscriptionFailed(_))));
    }

    #[tokio::test]
    async fn test_service_errors_become_transcription_failures() {
        let mut recognizer = MockRecognizer::returning(vec![]);
        recognizer.fail = true;
        let transcriber = Transcriber::new(Box::new(recognizer));
        match transcriber.transcribe(&track(), "en").await {
            Err(SubtranslateError::TranscriptionFailed(msg)) => assert!(msg.contains("unreadable")),
            other => panic!("Expected TranscriptionFailed, got: {other:?}"),
        }
    }

    #[test]
    fn test_inverted_segment_is_clamped() {
        let segments = index_segments(vec![recognized(5, 3, "odd")]);
        assert_eq!(segments[0].start, segments[0].end);
    }
}
