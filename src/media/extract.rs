use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use hound::WavReader;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, SubtranslateError};

use super::{AudioMetadata, AudioTrack, MediaFile, MediaKind, AUDIO_EXTENSION};

/// Turns a media file into an audio track the recognizer can read.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract(&self, media: &MediaFile) -> Result<AudioTrack>;
    fn name(&self) -> &'static str;
}

/// Sibling path of `source` with the audio extension.
pub fn audio_path_for(source: &Path) -> PathBuf {
    source.with_extension(AUDIO_EXTENSION)
}

/// Check if FFmpeg is installed and accessible.
pub async fn check_ffmpeg(binary: &Path) -> Result<()> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .await
        .map_err(|e| {
            SubtranslateError::ExtractionFailed(format!(
                "FFmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(SubtranslateError::ExtractionFailed(
            "FFmpeg check failed".to_string(),
        ));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Read WAV header information. Returns `None` for non-WAV or unreadable files.
pub fn read_wav_metadata(path: &Path) -> Option<AudioMetadata> {
    let reader = match WavReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            debug!("Could not read {} as WAV: {}", path.display(), e);
            return None;
        }
    };

    let spec = reader.spec();
    let frames = reader.duration();
    let duration = if spec.sample_rate > 0 {
        Duration::from_secs_f64(frames as f64 / spec.sample_rate as f64)
    } else {
        Duration::ZERO
    };

    Some(AudioMetadata {
        duration,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Demuxes video containers to mono 16 kHz PCM WAV with FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    binary: PathBuf,
}

impl Default for FfmpegExtractor {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific ffmpeg executable instead of the one on PATH.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    async fn demux(&self, input: &Path, output: &Path) -> Result<()> {
        check_ffmpeg(&self.binary).await?;

        let result = Command::new(&self.binary)
            .args(["-y", "-i"])
            .arg(input)
            .args(["-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                SubtranslateError::ExtractionFailed(format!("Failed to run FFmpeg: {e}"))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown error")
                .trim()
                .to_string();
            return Err(SubtranslateError::ExtractionFailed(format!(
                "FFmpeg could not extract audio from {}: {}",
                input.display(),
                reason
            )));
        }

        if !output.exists() {
            return Err(SubtranslateError::ExtractionFailed(
                "Output file was not created".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract(&self, media: &MediaFile) -> Result<AudioTrack> {
        if media.kind == MediaKind::Audio {
            debug!("{} is already audio, skipping extraction", media.path.display());
            return Ok(AudioTrack::passthrough(media));
        }

        if !media.path.exists() {
            return Err(SubtranslateError::ExtractionFailed(format!(
                "Input file not found: {}",
                media.path.display()
            )));
        }

        let output = audio_path_for(&media.path);
        info!("Extracting audio from {}", media.path.display());

        if let Err(e) = self.demux(&media.path, &output).await {
            if output.exists() {
                if let Err(rm) = std::fs::remove_file(&output) {
                    warn!("Failed to remove partial audio {}: {}", output.display(), rm);
                }
            }
            return Err(e);
        }

        let track = AudioTrack::extracted(output);
        info!(
            "Audio extracted to {} ({:.1}s)",
            track.path.display(),
            track.duration().unwrap_or_default().as_secs_f64()
        );
        Ok(track)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn ffmpeg_available() -> bool {
        std::process::Command::new("ffmpeg")
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn write_silence(path: &Path, seconds: u32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..(16000 * seconds) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_audio_path_for() {
        assert_eq!(
            audio_path_for(Path::new("/videos/talk.mp4")),
            PathBuf::from("/videos/talk.wav")
        );
    }

    #[test]
    fn test_read_wav_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.wav");
        write_silence(&path, 2);

        let meta = read_wav_metadata(&path).unwrap();
        assert_eq!(meta.sample_rate, 16000);
        assert_eq!(meta.channels, 1);
        assert_eq!(meta.duration, Duration::from_secs(2));

        assert!(read_wav_metadata(&dir.path().join("missing.wav")).is_none());
    }

    #[tokio::test]
    async fn test_audio_input_is_passthrough() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("note.wav");
        write_silence(&path, 1);

        let media = MediaFile::open(&path).unwrap();
        // A bogus binary proves ffmpeg is never invoked.
        let extractor = FfmpegExtractor::new().with_binary("/nonexistent/ffmpeg");
        let track = extractor.extract(&media).await.unwrap();

        assert!(track.passthrough);
        assert_eq!(track.path, path);
        assert_eq!(track.duration(), Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_extraction_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talk.mp4");
        std::fs::write(&path, b"not a video").unwrap();

        let media = MediaFile::open(&path).unwrap();
        let extractor = FfmpegExtractor::new().with_binary("/nonexistent/ffmpeg");
        let result = extractor.extract(&media).await;

        assert!(matches!(result, Err(SubtranslateError::ExtractionFailed(_))));
        assert!(!dir.path().join("talk.wav").exists());
    }

    #[tokio::test]
    async fn test_corrupt_video_leaves_no_audio() {
        if !ffmpeg_available() {
            eprintln!("Skipping test: FFmpeg not available");
            return;
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42 corrupted stream").unwrap();

        let media = MediaFile::open(&path).unwrap();
        let result = FfmpegExtractor::new().extract(&media).await;

        match result {
            Err(SubtranslateError::ExtractionFailed(msg)) => assert!(msg.contains("clip.mp4")),
            other => panic!("Expected ExtractionFailed, got: {other:?}"),
        }
        assert!(!dir.path().join("clip.wav").exists());
    }
}
