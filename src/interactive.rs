use crate::config::Config;
use crate::media::{MediaFile, AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::translate::{language_name, LANGUAGES};
use console::style;
use dialoguer::{Confirm, FuzzySelect, Input, Select};
use std::fs;
use std::path::{Path, PathBuf};

pub struct InteractiveSelection {
    pub input: PathBuf,
    pub config: Config,
}

/// Pick a file, a target language and confirm, starting from `config`.
pub fn run_interactive_wizard(mut config: Config) -> anyhow::Result<InteractiveSelection> {
    print_header();

    if config.needs_translation() {
        setup_api_key(&mut config)?;
    }

    let input = select_source_file()?;
    config.target_language = select_target_language(&config.target_language)?;

    print_summary(&input, &config);

    if !confirm_processing(&input)? {
        anyhow::bail!("File selection cancelled");
    }

    println!();
    Ok(InteractiveSelection { input, config })
}

/// Ask "Do you want to process this file?" for `input`.
pub fn confirm_processing(input: &Path) -> anyhow::Result<bool> {
    Ok(Confirm::new()
        .with_prompt(format!(
            "Do you want to process this file?\n  {}",
            input.display()
        ))
        .default(false)
        .interact()?)
}

fn print_header() {
    println!();
    println!(
        "{}",
        style("╔═══════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║      subtranslate - Subtitle Translator           ║").cyan()
    );
    println!(
        "{}",
        style("╚═══════════════════════════════════════════════════╝").cyan()
    );
    println!();
}

fn setup_api_key(config: &mut Config) -> anyhow::Result<()> {
    if config.gemini_api_key.is_some() {
        println!("{} Translation API key configured", style("✓").green());
        return Ok(());
    }

    println!("{} Gemini API key not found", style("!").yellow());
    println!("  Get one at: https://aistudio.google.com/apikey\n");

    let api_key: String = Input::new()
        .with_prompt("Enter your Gemini API key")
        .interact_text()?;

    if api_key.trim().is_empty() {
        anyhow::bail!("API key is required");
    }

    config.gemini_api_key = Some(api_key.trim().to_string());

    if Confirm::new()
        .with_prompt("Save API key to config file?")
        .default(true)
        .interact()?
    {
        save_config(config)?;
        println!("{} API key saved to config\n", style("✓").green());
    }

    Ok(())
}

fn save_config(config: &Config) -> anyhow::Result<()> {
    if let Some(config_path) = Config::config_file_path() {
        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let toml_content = toml::to_string_pretty(config)?;
        fs::write(config_path, toml_content)?;
    }
    Ok(())
}

fn select_source_file() -> anyhow::Result<PathBuf> {
    println!("\n{}", style("Select source file:").bold());

    let files = scan_media_files(Path::new("."))?;

    if files.is_empty() {
        println!("  No media files found in current directory.\n");
        return prompt_path();
    }

    let mut items: Vec<String> = files
        .iter()
        .map(|f| {
            let size = fs::metadata(f)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "?".to_string());
            format!("{} ({})", f.display(), size)
        })
        .collect();
    items.push("Enter custom path...".to_string());

    let selection = FuzzySelect::new()
        .with_prompt("Choose a file")
        .items(&items)
        .default(0)
        .interact()?;

    if selection == files.len() {
        prompt_path()
    } else {
        Ok(files[selection].clone())
    }
}

fn prompt_path() -> anyhow::Result<PathBuf> {
    let path: String = Input::new()
        .with_prompt("Enter file path")
        .interact_text()?;
    let path = PathBuf::from(path.trim());
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    if !MediaFile::is_supported(&path) {
        anyhow::bail!(
            "Unsupported file type. Supported: {}, {}",
            VIDEO_EXTENSIONS.join(", "),
            AUDIO_EXTENSIONS.join(", ")
        );
    }
    Ok(path)
}

fn scan_media_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && MediaFile::is_supported(&path) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn select_target_language(current: &str) -> anyhow::Result<String> {
    let mut options: Vec<String> = LANGUAGES
        .iter()
        .map(|(code, name)| format!("{} ({})", name, code))
        .collect();
    options.push("Other (enter code)...".to_string());

    let default = LANGUAGES
        .iter()
        .position(|(code, _)| code.eq_ignore_ascii_case(current))
        .unwrap_or(0);

    let selection = Select::new()
        .with_prompt("Translate subtitles to")
        .items(&options)
        .default(default)
        .interact()?;

    if selection == LANGUAGES.len() {
        let code: String = Input::new()
            .with_prompt("Enter language code (e.g., 'vi' for Vietnamese)")
            .interact_text()?;
        Ok(code.trim().to_lowercase())
    } else {
        Ok(LANGUAGES[selection].0.to_string())
    }
}

fn print_summary(input: &Path, config: &Config) {
    println!("\n{}", style("═══ Summary ═══").bold());
    println!("  Input:     {}", style(input.display()).cyan());
    println!(
        "  Output:    {}",
        style(crate::subtitle::subtitle_path_for(input).display()).cyan()
    );
    println!("  Model:     {}", config.transcription_model_id());
    println!("  Language:  {}", get_language_name(&config.source_language));
    println!("  Translate: → {}", get_language_name(&config.target_language));
    println!();
}

fn get_language_name(code: &str) -> String {
    match language_name(code) {
        Some(name) => format!("{} ({})", name, code),
        None => code.to_string(),
    }
}
