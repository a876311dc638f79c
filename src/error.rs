use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubtranslateError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Writing subtitles failed: {0}")]
    WriteFailed(String),

    #[error("Pipeline failed: {0}")]
    PipelineFailed(String),

    #[error("Pipeline cancelled")]
    Cancelled,

    #[error("A pipeline run is already in progress on this runner")]
    Busy,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid subtitle data: {0}")]
    InvalidSubtitle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SubtranslateError {
    /// True for the errors a pipeline stage is expected to report. Anything
    /// else coming out of a stage gets wrapped in `PipelineFailed`.
    pub fn is_stage_error(&self) -> bool {
        matches!(
            self,
            SubtranslateError::UnsupportedFormat(_)
                | SubtranslateError::ExtractionFailed(_)
                | SubtranslateError::TranscriptionFailed(_)
                | SubtranslateError::TranslationFailed(_)
                | SubtranslateError::WriteFailed(_)
                | SubtranslateError::PipelineFailed(_)
                | SubtranslateError::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, SubtranslateError>;
