use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{srt, SubtitleDocument};
use crate::config::OverwritePolicy;
use crate::error::{Result, SubtranslateError};
use crate::translate::TranslatedSegment;

/// `<dir>/<stem>.srt` next to the source media file.
pub fn subtitle_path_for(source: &Path) -> PathBuf {
    source.with_extension(srt::EXTENSION)
}

/// Serializes translated segments to an SRT file.
///
/// Output goes to a temp file in the destination directory that is renamed
/// into place, so readers never see a half-written subtitle.
#[derive(Debug, Clone, Default)]
pub struct SubtitleWriter {
    policy: OverwritePolicy,
}

impl SubtitleWriter {
    pub fn new(policy: OverwritePolicy) -> Self {
        Self { policy }
    }

    pub fn write(&self, segments: &[TranslatedSegment], destination: &Path) -> Result<PathBuf> {
        let document = SubtitleDocument::from_segments(segments);
        self.write_document(&document, destination)
    }

    pub fn write_document(&self, document: &SubtitleDocument, destination: &Path) -> Result<PathBuf> {
        let content = document.to_srt();

        if destination.exists() {
            match self.policy {
                OverwritePolicy::Overwrite => {
                    debug!("Overwriting existing {}", destination.display());
                }
                OverwritePolicy::Fail => {
                    let existing = fs::read(destination).map_err(|e| write_failed(destination, e))?;
                    if existing == content.as_bytes() {
                        info!("{} is already up to date", destination.display());
                        return Ok(destination.to_path_buf());
                    }
                    return Err(SubtranslateError::WriteFailed(format!(
                        "{} already exists with different content",
                        destination.display()
                    )));
                }
            }
        }

        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| write_failed(destination, e))?;
        temp.write_all(content.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| write_failed(destination, e))?;
        temp.persist(destination)
            .map_err(|e| write_failed(destination, e.error))?;

        info!("Wrote {} cues to {}", document.len(), destination.display());
        Ok(destination.to_path_buf())
    }
}

fn write_failed(path: &Path, err: std::io::Error) -> SubtranslateError {
    SubtranslateError::WriteFailed(format!("{}: {}", path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn segments() -> Vec<TranslatedSegment> {
        vec![
            TranslatedSegment {
                index: 1,
                start: Duration::ZERO,
                end: Duration::from_secs(2),
                translated_text: "Salut".to_string(),
            },
            TranslatedSegment {
                index: 2,
                start: Duration::from_secs(2),
                end: Duration::from_secs(5),
                translated_text: "Lume".to_string(),
            },
        ]
    }

    #[test]
    fn test_subtitle_path_for() {
        assert_eq!(
            subtitle_path_for(Path::new("/path/to/talk.mp4")),
            PathBuf::from("/path/to/talk.srt")
        );
        assert_eq!(
            subtitle_path_for(Path::new("note.wav")),
            PathBuf::from("note.srt")
        );
    }

    #[test]
    fn test_write_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("talk.srt");
        let writer = SubtitleWriter::default();

        writer.write(&segments(), &dest).unwrap();
        let first = fs::read(&dest).unwrap();
        writer.write(&segments(), &dest).unwrap();
        let second = fs::read(&dest).unwrap();

        assert_eq!(first, second);
        assert!(String::from_utf8(first).unwrap().contains("00:00:02,000 --> 00:00:05,000\nLume"));
    }

    #[test]
    fn test_empty_segments_produce_empty_file() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("silence.srt");
        SubtitleWriter::default().write(&[], &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "");
    }

    #[test]
    fn test_overwrite_policy_replaces() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("talk.srt");
        fs::write(&dest, "stale").unwrap();

        SubtitleWriter::new(OverwritePolicy::Overwrite)
            .write(&segments(), &dest)
            .unwrap();
        assert!(fs::read_to_string(&dest).unwrap().starts_with("1\n"));
    }

    #[test]
    fn test_fail_policy() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("talk.srt");
        let writer = SubtitleWriter::new(OverwritePolicy::Fail);

        writer.write(&segments(), &dest).unwrap();
        // Same content again is accepted.
        writer.write(&segments(), &dest).unwrap();

        fs::write(&dest, "edited by hand").unwrap();
        let result = writer.write(&segments(), &dest);
        assert!(matches!(result, Err(SubtranslateError::WriteFailed(_))));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "edited by hand");
    }

    #[test]
    fn test_missing_directory_is_write_failure() {
        let result = SubtitleWriter::default()
            .write(&segments(), Path::new("/nonexistent/dir/talk.srt"));
        assert!(matches!(result, Err(SubtranslateError::WriteFailed(_))));
    }
}
