use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use subtranslate::config::{Config, ModelSize, OverwritePolicy};
use subtranslate::interactive::{confirm_processing, run_interactive_wizard};
use subtranslate::media::FfmpegExtractor;
use subtranslate::subtitle::SubtitleWriter;
use subtranslate::transcribe::{Transcriber, WhisperClient};
use subtranslate::translate::{GeminiTranslator, PassthroughTranslator, Translator};
use subtranslate::{print_summary, PipelineConfig, PipelineEvent, PipelineResult, PipelineRunner};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "subtranslate")]
#[command(version, about = "Transcribe and translate video/audio into subtitles")]
#[command(
    long_about = "Extract the audio of a video or audio file, transcribe it with Whisper, translate every segment with Gemini and write a synchronized .srt next to the input."
)]
struct Cli {
    /// Input video/audio file (interactive picker when omitted)
    input: Option<PathBuf>,

    /// Target language code (e.g., ro, de, fr)
    #[arg(short, long)]
    target: Option<String>,

    /// Source language code spoken in the media
    #[arg(short, long)]
    source: Option<String>,

    /// Recognition model size: tiny, base, small, medium, large
    #[arg(short, long)]
    model_size: Option<String>,

    /// Fail instead of replacing an existing, different subtitle file
    #[arg(long)]
    fail_if_exists: bool,

    /// Delete the extracted audio after a successful run
    #[arg(long)]
    discard_audio: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn apply_cli(config: &mut Config, cli: &Cli) -> Result<()> {
    if let Some(ref target) = cli.target {
        config.target_language = target.trim().to_lowercase();
    }
    if let Some(ref source) = cli.source {
        config.source_language = source.trim().to_lowercase();
    }
    if let Some(ref size) = cli.model_size {
        config.model_size = size
            .parse::<ModelSize>()
            .map_err(|e: String| anyhow::anyhow!(e))?;
    }
    if cli.fail_if_exists {
        config.overwrite = OverwritePolicy::Fail;
    }
    if cli.discard_audio {
        config.keep_audio = false;
    }
    Ok(())
}

fn build_runner(config: &Config) -> PipelineRunner {
    let recognizer = match config.openai_api_key {
        Some(ref key) => WhisperClient::new(key.clone()).with_base_url(config.whisper_url.clone()),
        None => WhisperClient::local(config.whisper_url.clone()),
    }
    .with_model(config.transcription_model_id());

    let translator: Box<dyn Translator> = match config.gemini_api_key {
        Some(ref key) if config.needs_translation() => Box::new(
            GeminiTranslator::new(key.clone())
                .with_model(config.translation_model.clone())
                .with_source_language(config.source_language.clone())
                .with_max_input_tokens(config.max_translation_tokens),
        ),
        _ => Box::new(PassthroughTranslator),
    };

    PipelineRunner::new(
        Box::new(FfmpegExtractor::new()),
        Transcriber::new(Box::new(recognizer)),
        translator,
        SubtitleWriter::new(config.overwrite),
        PipelineConfig::from(config),
    )
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_cli(&mut config, &cli)?;

    let (input, config) = match cli.input {
        Some(ref input) => {
            if !cli.yes && !confirm_processing(input)? {
                println!("File selection cancelled.");
                return Ok(ExitCode::SUCCESS);
            }
            (input.clone(), config)
        }
        None => {
            let selection = run_interactive_wizard(config)?;
            (selection.input, selection.config)
        }
    };

    config
        .validate()
        .context("Configuration validation failed")?;

    info!("Input:    {}", input.display());
    info!("Model:    {}", config.transcription_model_id());
    info!(
        "Language: {} → {}",
        config.source_language, config.target_language
    );

    let runner = build_runner(&config);
    let handle = runner
        .start(&input)
        .with_context(|| format!("Cannot process {}", input.display()))?;

    let cancel = handle.cancel_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling after the current stage...");
        cancel.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let pb = progress_bar();
    let outcome = handle
        .run_to_completion(|event| match event {
            PipelineEvent::StageStarted(state) => pb.set_message(format!("{}...", state)),
            PipelineEvent::Progress(progress) => {
                pb.set_position(progress.percent as u64);
                if let Some(segments) = progress.segments {
                    pb.set_message(format!("segment {}/{}", segments.done, segments.total));
                }
            }
            PipelineEvent::Warning(message) => pb.println(format!("⚠ {}", message)),
            PipelineEvent::Completed { message, .. } => {
                pb.finish_with_message("done");
                println!("✓ {}", message);
            }
            PipelineEvent::Failed { message, .. } => {
                pb.abandon_with_message("failed");
                eprintln!("✗ {}", message);
            }
            PipelineEvent::Cancelled { stage } => {
                pb.abandon_with_message(format!("cancelled during {}", stage));
            }
        })
        .await;

    if let Ok(ref result) = outcome {
        print_summary(result);
    }
    Ok(ExitCode::from(exit_status(&outcome)))
}

/// Process exit status for a finished run. Errors were already reported by
/// the run's Failed or Cancelled event, so they are not printed again.
fn exit_status(outcome: &subtranslate::Result<PipelineResult>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subtranslate::SubtranslateError;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "subtranslate",
            "talk.mp4",
            "-t",
            "DE",
            "--model-size",
            "medium",
            "--fail-if-exists",
            "--discard-audio",
        ]);
        let mut config = Config::default();
        apply_cli(&mut config, &cli).unwrap();

        assert_eq!(config.target_language, "de");
        assert_eq!(config.source_language, "en");
        assert_eq!(config.model_size, ModelSize::Medium);
        assert_eq!(config.overwrite, OverwritePolicy::Fail);
        assert!(!config.keep_audio);
    }

    #[test]
    fn test_failed_run_exits_nonzero() {
        let failed = Err(SubtranslateError::TranslationFailed("down".into()));
        assert_eq!(exit_status(&failed), 1);
        assert_eq!(exit_status(&Err(SubtranslateError::Cancelled)), 1);
    }

    #[test]
    fn test_invalid_model_size() {
        let cli = Cli::parse_from(["subtranslate", "talk.mp4", "-m", "gigantic"]);
        assert!(apply_cli(&mut Config::default(), &cli).is_err());
    }
}
