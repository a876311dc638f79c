use crate::config::Config;
use crate::error::{Result, SubtranslateError};
use crate::media::{AudioExtractor, AudioTrack, MediaFile};
use crate::progress::{PipelineEvent, Progress, ProgressReporter, SegmentProgress};
use crate::subtitle::{subtitle_path_for, SubtitleWriter};
use crate::transcribe::Transcriber;
use crate::translate::{TranslatedSegment, Translator};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Share of the transcribe bucket given to recognition; translation gets the rest.
const RECOGNITION_SHARE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Idle,
    Extracting,
    Transcribing,
    Translating,
    Writing,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineState {
    /// Stage name used in logs and failure messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extract",
            Self::Transcribing => "transcribe",
            Self::Translating => "translate",
            Self::Writing => "write",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Configuration for the subtitle generation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Language spoken in the source media.
    pub source_language: String,
    /// Language of the written subtitles.
    pub target_language: String,
    /// Keep the extracted audio track after a successful run.
    pub keep_audio: bool,
    /// Capacity of the event channel.
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "ro".to_string(),
            keep_audio: true,
            event_buffer: 64,
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            keep_audio: config.keep_audio,
            ..Self::default()
        }
    }
}

/// Statistics from the subtitle generation process.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_time: Duration,
    pub extraction_time: Duration,
    pub transcription_time: Duration,
    pub translation_time: Duration,
    pub write_time: Duration,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Path to the output subtitle file.
    pub output_path: PathBuf,
    /// Audio track that was transcribed.
    pub audio: AudioTrack,
    /// Number of cues written.
    pub cue_count: usize,
    /// Segments whose text was cut to fit the translation token budget.
    pub truncated_segments: usize,
    pub stats: PipelineStats,
}

impl PipelineResult {
    pub fn message(&self) -> String {
        format!(
            "Processing completed: {} subtitles written to {}",
            self.cue_count,
            self.output_path.display()
        )
    }
}

/// Services shared by every run of a runner.
struct Stages {
    extractor: Arc<dyn AudioExtractor>,
    transcriber: Transcriber,
    translator: Arc<dyn Translator>,
    writer: SubtitleWriter,
    config: PipelineConfig,
}

/// Runs extract, transcribe, translate and write on a background task.
///
/// One run at a time per runner; start a second runner for concurrent runs.
/// Two runs on the same source path race on the derived output paths.
pub struct PipelineRunner {
    stages: Arc<Stages>,
    busy: Arc<AtomicBool>,
}

impl PipelineRunner {
    pub fn new(
        extractor: Box<dyn AudioExtractor>,
        transcriber: Transcriber,
        translator: Box<dyn Translator>,
        writer: SubtitleWriter,
        config: PipelineConfig,
    ) -> Self {
        Self {
            stages: Arc::new(Stages {
                extractor: Arc::from(extractor),
                transcriber,
                translator: Arc::from(translator),
                writer,
                config,
            }),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate `input` and start a run on the Tokio runtime.
    ///
    /// Unsupported or missing inputs are rejected here, before any stage
    /// runs. Must be called from within a Tokio runtime.
    pub fn start(&self, input: impl Into<PathBuf>) -> Result<RunHandle> {
        let media = MediaFile::open(input)?;

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SubtranslateError::Busy);
        }
        let guard = BusyGuard(self.busy.clone());

        let (tx, rx) = mpsc::channel(self.stages.config.event_buffer.max(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let reporter = ProgressReporter::new(tx);
        let run = PipelineRun {
            media,
            reporter: reporter.clone(),
            cancelled: cancelled.clone(),
        };
        let stages = self.stages.clone();

        info!("Starting pipeline for {}", run.media.path.display());

        let task = tokio::spawn(async move {
            // Stages run on their own task so a panic in a service still
            // ends the run with a terminal event.
            let worker = tokio::spawn(async move { run.execute(&stages).await });
            let outcome = join(worker).await;
            // Free the runner before the terminal event so a caller reacting
            // to it can start the next run immediately.
            drop(guard);
            finish(&reporter, &outcome).await;
            outcome
        });

        Ok(RunHandle {
            events: rx,
            task,
            cancelled,
        })
    }
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Caller side of a run: events, cancellation and the final result.
pub struct RunHandle {
    events: mpsc::Receiver<PipelineEvent>,
    task: JoinHandle<Result<PipelineResult>>,
    cancelled: Arc<AtomicBool>,
}

impl RunHandle {
    /// Next event, or `None` once the terminal event has been delivered.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.events.recv().await
    }

    /// Request cancellation. Checked between stages and between segments.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Wait for the run, discarding any undelivered events.
    pub async fn wait(self) -> Result<PipelineResult> {
        let RunHandle { events, task, .. } = self;
        drop(events);
        join(task).await
    }

    /// Deliver every event to `on_event`, then return the run's result.
    pub async fn run_to_completion(
        mut self,
        mut on_event: impl FnMut(&PipelineEvent),
    ) -> Result<PipelineResult> {
        while let Some(event) = self.events.recv().await {
            on_event(&event);
        }
        join(self.task).await
    }
}

async fn join(task: JoinHandle<Result<PipelineResult>>) -> Result<PipelineResult> {
    task.await.map_err(|e| {
        SubtranslateError::PipelineFailed(format!("pipeline worker stopped: {e}"))
    })?
}

/// Keep taxonomy errors as they are; wrap anything else with the stage name.
fn stage_error(state: PipelineState, err: SubtranslateError) -> SubtranslateError {
    if err.is_stage_error() {
        err
    } else {
        SubtranslateError::PipelineFailed(format!("{} stage: {}", state, err))
    }
}

/// State owned by one run; dropped when the worker task ends.
struct PipelineRun {
    media: MediaFile,
    reporter: ProgressReporter,
    cancelled: Arc<AtomicBool>,
}

impl PipelineRun {
    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(SubtranslateError::Cancelled);
        }
        Ok(())
    }

    async fn enter(&self, state: PipelineState) -> Result<()> {
        self.check_cancelled()?;
        self.reporter.stage_started(state).await;
        Ok(())
    }

    async fn execute(&self, stages: &Stages) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let config = &stages.config;

        self.reporter
            .send(PipelineEvent::Progress(Progress {
                percent: 0,
                segments: None,
            }))
            .await;

        // Stage 1: Audio extraction
        self.enter(PipelineState::Extracting).await?;
        info!("Stage 1/4: Extracting audio from {}", self.media.path.display());
        let extraction_start = Instant::now();

        let audio = stages
            .extractor
            .extract(&self.media)
            .await
            .map_err(|e| stage_error(PipelineState::Extracting, e))?;

        let extraction_time = extraction_start.elapsed();
        self.reporter.complete_stage().await;

        // Stage 2: Transcription
        self.enter(PipelineState::Transcribing).await?;
        info!(
            "Stage 2/4: Transcribing with {} ({})",
            stages.transcriber.recognizer_name(),
            config.source_language
        );
        let transcription_start = Instant::now();

        let reporter = self.reporter.clone();
        let on_progress = move |fraction: f64| reporter.partial(fraction * RECOGNITION_SHARE, None);
        let segments = stages
            .transcriber
            .transcribe_with_progress(&audio, &config.source_language, &on_progress)
            .await
            .map_err(|e| stage_error(PipelineState::Transcribing, e))?;
        self.reporter.partial(RECOGNITION_SHARE, None);

        let transcription_time = transcription_start.elapsed();
        info!(
            "Transcription complete: {} segments in {:.2}s",
            segments.len(),
            transcription_time.as_secs_f64()
        );

        // Stage 3: Translation, one segment at a time
        self.enter(PipelineState::Translating).await?;
        info!(
            "Stage 3/4: Translating {} segments to {}",
            segments.len(),
            config.target_language
        );
        let translation_start = Instant::now();

        let total = segments.len();
        let mut translated = Vec::with_capacity(total);
        let mut truncated_segments = 0;

        for segment in segments {
            self.check_cancelled()?;

            let translation = stages
                .translator
                .translate(&segment.source_text, &config.target_language)
                .await
                .map_err(|e| stage_error(PipelineState::Translating, e))?;

            if translation.truncated {
                truncated_segments += 1;
                let message = format!(
                    "Segment {} exceeded the translation token budget and was truncated",
                    segment.index
                );
                warn!("{}", message);
                self.reporter.warn(message).await;
            }

            translated.push(TranslatedSegment::new(segment, translation.text));

            let done = translated.len();
            let fraction = RECOGNITION_SHARE + (1.0 - RECOGNITION_SHARE) * done as f64 / total as f64;
            self.reporter
                .partial(fraction, Some(SegmentProgress { done, total }));
        }

        let translation_time = translation_start.elapsed();
        self.reporter.complete_stage().await;

        // Stage 4: Subtitle output
        self.enter(PipelineState::Writing).await?;
        let destination = subtitle_path_for(&self.media.path);
        info!("Stage 4/4: Writing {}", destination.display());
        let write_start = Instant::now();

        let output_path = stages
            .writer
            .write(&translated, &destination)
            .map_err(|e| stage_error(PipelineState::Writing, e))?;

        let write_time = write_start.elapsed();

        if !config.keep_audio && !audio.passthrough {
            match std::fs::remove_file(&audio.path) {
                Ok(()) => info!("Removed intermediate audio {}", audio.path.display()),
                Err(e) => warn!("Failed to remove {}: {}", audio.path.display(), e),
            }
        }

        self.reporter.complete_stage().await;

        Ok(PipelineResult {
            output_path,
            audio,
            cue_count: translated.len(),
            truncated_segments,
            stats: PipelineStats {
                total_time: start_time.elapsed(),
                extraction_time,
                transcription_time,
                translation_time,
                write_time,
            },
        })
    }
}

/// Send the single terminal event for a run.
async fn finish(reporter: &ProgressReporter, outcome: &Result<PipelineResult>) {
    let stage = reporter.stage();
    let event = match outcome {
        Ok(result) => {
            info!("{}", result.message());
            PipelineEvent::Completed {
                output: result.output_path.clone(),
                message: result.message(),
            }
        }
        Err(SubtranslateError::Cancelled) => {
            warn!("Pipeline cancelled before {} finished", stage);
            PipelineEvent::Cancelled { stage }
        }
        Err(e) => {
            error!("Pipeline failed during {}: {}", stage, e);
            PipelineEvent::Failed {
                stage,
                message: format!("Error during {} stage: {}", stage, e),
            }
        }
    };
    reporter.send(event).await;
}

/// Print a summary of the pipeline results.
pub fn print_summary(result: &PipelineResult) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                     Subtitle Translation Complete              ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:     {}", result.output_path.display());
    println!("  Audio:      {}", result.audio.path.display());
    println!("  Cues:       {}", result.cue_count);
    if let Some(duration) = result.audio.duration() {
        println!("  Duration:   {:.1}s audio", duration.as_secs_f64());
    }
    println!();
    println!("  Timing:");
    println!("    Extract:     {:.2}s", result.stats.extraction_time.as_secs_f64());
    println!("    Transcribe:  {:.2}s", result.stats.transcription_time.as_secs_f64());
    println!("    Translate:   {:.2}s", result.stats.translation_time.as_secs_f64());
    println!("    Write:       {:.2}s", result.stats.write_time.as_secs_f64());
    println!("    Total:       {:.2}s", result.stats.total_time.as_secs_f64());
    if result.truncated_segments > 0 {
        println!();
        println!(
            "  Note: {} segment(s) were truncated to fit the translation model",
            result.truncated_segments
        );
    }
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_language, "en");
        assert_eq!(config.target_language, "ro");
        assert!(config.keep_audio);
        assert_eq!(config.event_buffer, 64);
    }

    #[test]
    fn test_pipeline_config_from_config() {
        let config = Config {
            target_language: "de".to_string(),
            keep_audio: false,
            ..Config::default()
        };
        let pipeline_config = PipelineConfig::from(&config);
        assert_eq!(pipeline_config.target_language, "de");
        assert!(!pipeline_config.keep_audio);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(PipelineState::Extracting.to_string(), "extract");
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Writing.is_terminal());
    }

    #[test]
    fn test_stage_error_wrapping() {
        let kept = stage_error(
            PipelineState::Translating,
            SubtranslateError::TranslationFailed("down".into()),
        );
        assert!(matches!(kept, SubtranslateError::TranslationFailed(_)));

        let wrapped = stage_error(
            PipelineState::Writing,
            SubtranslateError::Io(std::io::Error::other("disk full")),
        );
        match wrapped {
            SubtranslateError::PipelineFailed(msg) => {
                assert!(msg.contains("write"));
                assert!(msg.contains("disk full"));
            }
            other => panic!("Expected PipelineFailed, got: {other:?}"),
        }
    }
}
