// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, info, warn};
use std::io::Write;
use std::path::PathBuf;

use ocrsub::app_config::{self, AnnotationProviderKind, Config};
use ocrsub::app_controller::{Controller, RunOutcome, VideoInput};
use ocrsub::file_utils::{FileManager, FileType};
use ocrsub::language_utils::get_language_name;
use ocrsub::synthesis::ScriptFilter;

/// CLI Wrapper for ScriptFilter to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliScript {
    Any,
    Han,
    Hangul,
    Kana,
    Latin,
    Cyrillic,
}

impl From<CliScript> for ScriptFilter {
    fn from(cli_script: CliScript) -> Self {
        match cli_script {
            CliScript::Any => ScriptFilter::Any,
            CliScript::Han => ScriptFilter::Han,
            CliScript::Hangul => ScriptFilter::Hangul,
            CliScript::Kana => ScriptFilter::Kana,
            CliScript::Latin => ScriptFilter::Latin,
            CliScript::Cyrillic => ScriptFilter::Cyrillic,
        }
    }
}

/// CLI Wrapper for AnnotationProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    VideoIntelligence,
    Mock,
}

impl From<CliProvider> for AnnotationProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::VideoIntelligence => AnnotationProviderKind::VideoIntelligence,
            CliProvider::Mock => AnnotationProviderKind::Mock,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect on-screen text in videos and write SRT subtitles (default command)
    Generate(GenerateArgs),

    /// Rebuild subtitles from a saved *_annotations.json file without calling the service
    Resynthesize(ResynthesizeArgs),

    /// Validate the configuration and test the connection to the annotation service
    Check(CommonArgs),

    /// Generate shell completions for ocrsub
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every command that loads the configuration
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Annotation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// API key for the annotation service
    #[arg(long, env = "OCRSUB_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OAuth access token for the annotation service
    #[arg(long, env = "OCRSUB_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,
}

/// Synthesis tuning and output options
#[derive(Args, Debug, Clone)]
struct SynthesisArgs {
    /// Directory for generated files (default: next to the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Minimum segment confidence, inclusive (0.0 - 1.0)
    #[arg(long)]
    threshold: Option<f32>,

    /// Largest gap in seconds between same-text segments that still merge
    #[arg(long)]
    gap: Option<f64>,

    /// Writing system detections must consist of
    #[arg(long, value_enum)]
    script: Option<CliScript>,

    /// Regular expression detections must match (overrides --script)
    #[arg(long)]
    pattern: Option<String>,

    /// Skip the *_segments.txt diagnostic listing
    #[arg(long)]
    no_segments_log: bool,
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    /// Video file, directory of videos, or gs:// URI
    #[arg(value_name = "INPUT_PATH")]
    input_path: String,

    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    synthesis: SynthesisArgs,

    /// Language hint for text detection (repeatable, e.g. zh, ko, zh-TW)
    #[arg(long = "language-hint")]
    language_hints: Vec<String>,

    /// Save raw detections to *_annotations.json for later re-synthesis
    #[arg(long)]
    save_annotations: bool,
}

#[derive(Args, Debug, Clone)]
struct ResynthesizeArgs {
    /// Saved annotation file
    #[arg(value_name = "ANNOTATIONS_JSON")]
    annotations_path: PathBuf,

    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    synthesis: SynthesisArgs,
}

/// ocrsub - subtitles from on-screen text
///
/// Sends videos to a cloud text-detection service and merges the noisy
/// per-frame detections into clean, timed SRT subtitles.
#[derive(Parser, Debug)]
#[command(name = "ocrsub")]
#[command(version)]
#[command(about = "Generate SRT subtitles from text burned into videos")]
#[command(long_about = "ocrsub detects on-screen text with Google Cloud Video Intelligence and merges the detections into SRT subtitles.

EXAMPLES:
    ocrsub movie.mp4                               # Annotate and write movie.srt next to it
    ocrsub -f --script han movie.mp4               # Keep only Chinese ideograph captions
    ocrsub --threshold 0.7 --gap 0.5 movie.mp4     # Tune merging
    ocrsub --save-annotations /videos/             # Process a folder, keep raw detections
    ocrsub gs://bucket/clip.mp4 -o subtitle/       # Let the service read from cloud storage
    ocrsub resynthesize subtitle/clip_annotations.json --threshold 0.65 -f
    ocrsub check                                   # Validate config and credentials
    ocrsub completions bash > ocrsub.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. Credentials may also come from OCRSUB_API_KEY or
    OCRSUB_ACCESS_TOKEN.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Video file, directory of videos, or gs:// URI
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<String>,

    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    synthesis: SynthesisArgs,

    /// Language hint for text detection (repeatable, e.g. zh, ko, zh-TW)
    #[arg(long = "language-hint")]
    language_hints: Vec<String>,

    /// Save raw detections to *_annotations.json for later re-synthesis
    #[arg(long)]
    save_annotations: bool,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("ocrsub")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "ocrsub", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Generate(args)) => run_generate(args).await,
        Some(Commands::Resynthesize(args)) => run_resynthesize(args),
        Some(Commands::Check(common)) => run_check(common).await,
        None => {
            // Top-level arguments behave like `generate`
            let input_path = cli
                .input_path
                .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;
            run_generate(GenerateArgs {
                input_path,
                common: cli.common,
                synthesis: cli.synthesis,
                language_hints: cli.language_hints,
                save_annotations: cli.save_annotations,
            })
            .await
        }
    }
}

/// Load the config file (creating it if missing) and apply command-line overrides
fn load_config(common: &CommonArgs, synthesis: Option<&SynthesisArgs>) -> Result<Config> {
    if let Some(level) = &common.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let (mut config, created) = Config::load_or_create(&common.config_path)?;
    if created {
        warn!("Config file not found at '{}', created a default config.", common.config_path);
    }

    if let Some(level) = &common.log_level {
        config.log_level = level.clone().into();
    }
    if let Some(provider) = &common.provider {
        config.annotation.provider = provider.clone().into();
    }
    if let Some(api_key) = &common.api_key {
        config.annotation.api_key = api_key.clone();
    }
    if let Some(access_token) = &common.access_token {
        config.annotation.access_token = access_token.clone();
    }

    if let Some(args) = synthesis {
        if let Some(threshold) = args.threshold {
            config.synthesis.confidence_threshold = threshold;
        }
        if let Some(gap) = args.gap {
            config.synthesis.gap_tolerance_secs = gap;
        }
        if let Some(script) = &args.script {
            config.synthesis.script = script.clone().into();
        }
        if let Some(pattern) = &args.pattern {
            config.synthesis.text_pattern = Some(pattern.clone());
        }
        if args.no_segments_log {
            config.output.write_segments_log = false;
        }
    }

    log::set_max_level(config.log_level.to_level_filter());
    Ok(config)
}

async fn run_generate(args: GenerateArgs) -> Result<()> {
    let mut config = load_config(&args.common, Some(&args.synthesis))?;
    if !args.language_hints.is_empty() {
        config.annotation.language_hints = args.language_hints.clone();
    }
    if args.save_annotations {
        config.output.save_annotations = true;
    }

    let input = VideoInput::parse(&args.input_path);

    // A saved annotation file needs no service call
    if let VideoInput::File(path) = &input {
        if FileManager::file_exists(path) && FileManager::detect_file_type(path) == FileType::Annotations {
            return run_resynthesize(ResynthesizeArgs {
                annotations_path: path.clone(),
                common: args.common,
                synthesis: args.synthesis,
            });
        }
    }

    config.validate()?;

    for hint in config.annotation.normalized_language_hints()? {
        let primary = hint.split('-').next().unwrap_or_default();
        match get_language_name(primary) {
            Ok(name) => debug!("Language hint: {} ({})", hint, name),
            Err(_) => debug!("Language hint: {}", hint),
        }
    }

    info!(
        "ocrsub: {} (threshold {}, gap {}s, script {})",
        config.annotation.provider.display_name(),
        config.synthesis.confidence_threshold,
        config.synthesis.gap_tolerance_secs,
        config.synthesis.script
    );

    let controller = Controller::with_config(config)?;
    let output_dir = args.synthesis.output_dir.as_deref();
    let force = args.synthesis.force_overwrite;

    match &input {
        VideoInput::File(path) if FileManager::dir_exists(path) => {
            let summary = controller.run_folder(path, output_dir, force).await?;
            if summary.failed > 0 {
                let total = summary.generated + summary.skipped + summary.failed;
                return Err(anyhow!("{} of {} videos failed", summary.failed, total));
            }
        }
        VideoInput::File(path) if !path.exists() => {
            return Err(anyhow!("Input path does not exist: {:?}", path));
        }
        _ => report(controller.run(input.clone(), output_dir, force).await?),
    }

    Ok(())
}

fn run_resynthesize(args: ResynthesizeArgs) -> Result<()> {
    let mut config = load_config(&args.common, Some(&args.synthesis))?;
    // Offline: saved detections need no credentials
    config.annotation.provider = AnnotationProviderKind::Mock;
    config.validate()?;

    let controller = Controller::with_config(config)?;
    report(controller.resynthesize(
        &args.annotations_path,
        args.synthesis.output_dir.as_deref(),
        args.synthesis.force_overwrite,
    )?);
    Ok(())
}

async fn run_check(common: CommonArgs) -> Result<()> {
    let config = load_config(&common, None)?;
    config.validate()?;

    let controller = Controller::with_config(config)?;
    controller.test_connection().await?;
    info!("Configuration '{}' is valid", common.config_path);
    Ok(())
}

fn report(outcome: RunOutcome) {
    match outcome {
        RunOutcome::Generated(summary) => info!(
            "Success: {:?} ({} cues from {} segments)",
            summary.srt_path, summary.cues, summary.segments
        ),
        RunOutcome::Skipped(path) => info!("Skipped: {:?}", path),
    }
}
