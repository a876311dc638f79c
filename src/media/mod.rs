pub mod extract;

pub use extract::{audio_path_for, check_ffmpeg, read_wav_metadata, AudioExtractor, FfmpegExtractor};

use crate::error::{Result, SubtranslateError};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "mov", "avi", "webm"];
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "m4a", "ogg"];

/// Extension of extracted audio tracks.
pub const AUDIO_EXTENSION: &str = "wav";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Detect the kind from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// A user-selected source file with a supported extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaFile {
    /// Classify `path` by extension. Does not touch the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let kind = MediaKind::from_path(&path).ok_or_else(|| {
            SubtranslateError::UnsupportedFormat(format!(
                "{} (supported: {}, {})",
                path.display(),
                VIDEO_EXTENSIONS.join(", "),
                AUDIO_EXTENSIONS.join(", ")
            ))
        })?;
        Ok(Self { path, kind })
    }

    /// Classify `path` and require that it exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let media = Self::new(path)?;
        if !media.path.is_file() {
            return Err(SubtranslateError::FileNotFound(
                media.path.display().to_string(),
            ));
        }
        Ok(media)
    }

    pub fn is_supported(path: &Path) -> bool {
        MediaKind::from_path(path).is_some()
    }
}

/// Metadata about an audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMetadata {
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Audio ready for transcription. Never modified after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    /// True when the source file was already audio and is used as-is.
    pub passthrough: bool,
    pub metadata: Option<AudioMetadata>,
}

impl AudioTrack {
    pub fn passthrough(media: &MediaFile) -> Self {
        Self {
            path: media.path.clone(),
            passthrough: true,
            metadata: read_wav_metadata(&media.path),
        }
    }

    pub fn extracted(path: PathBuf) -> Self {
        let metadata = read_wav_metadata(&path);
        Self {
            path,
            passthrough: false,
            metadata,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.metadata.as_ref().map(|m| m.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_detection() {
        assert_eq!(MediaKind::from_path(Path::new("talk.mp4")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("TALK.MKV")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("note.wav")), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_unsupported_format_fails_fast() {
        match MediaFile::new("/tmp/document.pdf") {
            Err(SubtranslateError::UnsupportedFormat(msg)) => assert!(msg.contains("document.pdf")),
            other => panic!("Expected UnsupportedFormat, got: {other:?}"),
        }
    }

    #[test]
    fn test_open_missing_file() {
        let result = MediaFile::open("/nonexistent/clip.mp4");
        assert!(matches!(result, Err(SubtranslateError::FileNotFound(_))));
    }

    #[test]
    fn test_passthrough_track_keeps_path() {
        let media = MediaFile::new("/nonexistent/note.wav").unwrap();
        let track = AudioTrack::passthrough(&media);
        assert!(track.passthrough);
        assert_eq!(track.path, media.path);
        assert!(track.metadata.is_none());
    }
}
