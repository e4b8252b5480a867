use anyhow::{Result, anyhow};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotation::{AnnotationSet, RawDetection};
use crate::app_config::Config;
use crate::errors::AppError;
use crate::file_utils::FileManager;
use crate::providers::{self, AnnotationProvider, AnnotationRequest, VideoSource};
use crate::subtitle_processor::SubtitleTrack;
use crate::synthesis::Synthesizer;

// @module: Application controller for subtitle generation

const SEGMENTS_SUFFIX: &str = "_segments";
const ANNOTATIONS_SUFFIX: &str = "_annotations";

/// A video to annotate: a local file or a cloud storage object
#[derive(Debug, Clone, PartialEq)]
pub enum VideoInput {
    /// Local file, uploaded inline
    File(PathBuf),
    /// Cloud storage URI read by the service directly
    Uri(String),
}

impl VideoInput {
    /// Interpret a command-line argument
    pub fn parse(input: &str) -> Self {
        if FileManager::is_cloud_uri(input) {
            Self::Uri(input.to_string())
        } else {
            Self::File(PathBuf::from(input))
        }
    }

    /// Path or URI as shown in logs and saved annotations
    pub fn display_name(&self) -> String {
        match self {
            Self::File(path) => path.to_string_lossy().to_string(),
            Self::Uri(uri) => uri.clone(),
        }
    }

    /// Where outputs go when no output directory is configured
    fn default_output_dir(&self) -> PathBuf {
        match self {
            Self::File(path) => path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")),
            Self::Uri(_) => PathBuf::from("."),
        }
    }
}

/// Files produced for one video
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    /// Subtitle file
    pub srt: PathBuf,
    /// Pre-merge segment listing
    pub segments: PathBuf,
    /// Saved detections
    pub annotations: PathBuf,
}

impl OutputPaths {
    pub fn for_video(video_name: &str, output_dir: &Path) -> Self {
        Self {
            srt: FileManager::generate_output_path(video_name, output_dir, "", "srt"),
            segments: FileManager::generate_output_path(video_name, output_dir, SEGMENTS_SUFFIX, "txt"),
            annotations: FileManager::generate_output_path(video_name, output_dir, ANNOTATIONS_SUFFIX, "json"),
        }
    }
}

/// Result of processing one video
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Subtitles were written
    Generated(ProcessSummary),
    /// Output already existed and overwriting was not requested
    Skipped(PathBuf),
}

/// What was produced for one video
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSummary {
    /// Written subtitle file
    pub srt_path: PathBuf,
    /// Raw detections received
    pub detections: usize,
    /// Qualifying segments before merging
    pub segments: usize,
    /// Cues written
    pub cues: usize,
    /// Whether detections came from a saved annotation file
    pub reused_annotations: bool,
}

/// Counts for a folder run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderSummary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Main application controller for subtitle generation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Annotation service client
    provider: Arc<dyn AnnotationProvider>,
    // @field: Validated synthesis pipeline
    synthesizer: Synthesizer,
}

impl Controller {
    // @method: Create a new controller with the provider selected by the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = providers::create_provider(&config.annotation)?;
        Self::with_provider(config, provider)
    }

    // @method: Create a controller around an explicit provider
    pub fn with_provider(config: Config, provider: Arc<dyn AnnotationProvider>) -> Result<Self> {
        let synthesizer = Synthesizer::new(&config.synthesis)?;
        debug!(
            "Synthesis: confidence >= {}, gap tolerance {}s, script {}",
            synthesizer.filter().confidence_threshold(),
            synthesizer.gap_tolerance_secs(),
            config.synthesis.script
        );
        Ok(Self {
            config,
            provider,
            synthesizer,
        })
    }

    /// Check that the annotation service is reachable with the configured credentials
    pub async fn test_connection(&self) -> Result<()> {
        self.provider.test_connection().await.map_err(AppError::from)?;
        info!("{} provider is reachable", self.config.annotation.provider.display_name());
        Ok(())
    }

    fn resolve_output_dir(&self, input: &VideoInput, output_dir: Option<&Path>) -> PathBuf {
        output_dir
            .map(Path::to_path_buf)
            .or_else(|| self.config.output.output_dir.clone())
            .unwrap_or_else(|| input.default_output_dir())
    }

    /// Annotate one video and write its subtitles
    pub async fn run(&self, input: VideoInput, output_dir: Option<&Path>, force_overwrite: bool) -> Result<RunOutcome> {
        self.run_with_progress(input, output_dir, force_overwrite, &MultiProgress::new()).await
    }

    async fn run_with_progress(
        &self,
        input: VideoInput,
        output_dir: Option<&Path>,
        force_overwrite: bool,
        multi_progress: &MultiProgress,
    ) -> Result<RunOutcome> {
        let start_time = Instant::now();
        let video_name = input.display_name();

        if let VideoInput::File(path) = &input {
            if !FileManager::file_exists(path) {
                return Err(anyhow!("Input file does not exist: {:?}", path));
            }
        }

        let output_dir = self.resolve_output_dir(&input, output_dir);
        FileManager::ensure_dir(&output_dir)?;
        let paths = OutputPaths::for_video(&video_name, &output_dir);

        if paths.srt.exists() && !force_overwrite {
            warn!("Skipping {}, subtitles already exist (use -f to force overwrite)", video_name);
            return Ok(RunOutcome::Skipped(paths.srt));
        }

        let (detections, reused_annotations) = self
            .obtain_detections(&input, &paths, force_overwrite, multi_progress)
            .await
            .map_err(|e| AppError::processing_failed(&video_name, &e))?;

        let summary = self.write_outputs(&video_name, &detections, &paths, reused_annotations)?;

        info!(
            "Generated {} cues for {} in {}",
            summary.cues,
            video_name,
            Self::format_duration(start_time.elapsed())
        );

        Ok(RunOutcome::Generated(summary))
    }

    /// Re-run synthesis from a saved annotation file without calling the service
    pub fn resynthesize(&self, annotations_file: &Path, output_dir: Option<&Path>, force_overwrite: bool) -> Result<RunOutcome> {
        let set = AnnotationSet::load(annotations_file)?;

        let video_name = if set.video.is_empty() {
            let stem = FileManager::video_stem(&annotations_file.to_string_lossy());
            stem.strip_suffix(ANNOTATIONS_SUFFIX).unwrap_or(&stem).to_string()
        } else {
            set.video.clone()
        };

        let output_dir = output_dir
            .map(Path::to_path_buf)
            .or_else(|| self.config.output.output_dir.clone())
            .or_else(|| annotations_file.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        FileManager::ensure_dir(&output_dir)?;
        let paths = OutputPaths::for_video(&video_name, &output_dir);

        if paths.srt.exists() && !force_overwrite {
            warn!("Skipping {}, subtitles already exist (use -f to force overwrite)", video_name);
            return Ok(RunOutcome::Skipped(paths.srt));
        }

        info!("Re-synthesizing {} from {} saved detections", video_name, set.detections.len());
        let summary = self.write_outputs(&video_name, &set.detections, &paths, true)?;
        info!("Wrote {} cues to {:?}", summary.cues, summary.srt_path);

        Ok(RunOutcome::Generated(summary))
    }

    /// Process every video under a directory, several at a time
    pub async fn run_folder(&self, input_dir: &Path, output_dir: Option<&Path>, force_overwrite: bool) -> Result<FolderSummary> {
        let start_time = Instant::now();

        if !FileManager::dir_exists(input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let video_files = FileManager::find_video_files(input_dir)?;
        if video_files.is_empty() {
            return Err(anyhow!("No video files found in directory: {:?}", input_dir));
        }

        info!("Found {} video files in {:?}", video_files.len(), input_dir);

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(video_files.len() as u64));
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(style);
        folder_pb.set_message("Processing files");

        // Explicit output directories mirror the input tree
        let output_root = output_dir
            .map(Path::to_path_buf)
            .or_else(|| self.config.output.output_dir.clone());

        let concurrency = self.config.annotation.concurrent_requests.max(1);
        let results = stream::iter(video_files)
            .map(|video_file| {
                let multi_progress = &multi_progress;
                let folder_pb = &folder_pb;
                let video_output = output_root
                    .as_deref()
                    .map(|root| FileManager::mirrored_output_dir(input_dir, &video_file, root));
                async move {
                    let result = self
                        .run_with_progress(
                            VideoInput::File(video_file.clone()),
                            video_output.as_deref(),
                            force_overwrite,
                            multi_progress,
                        )
                        .await;
                    folder_pb.inc(1);
                    (video_file, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;

        folder_pb.finish_and_clear();

        let mut summary = FolderSummary::default();
        for (video_file, result) in results {
            match result {
                Ok(RunOutcome::Generated(_)) => summary.generated += 1,
                Ok(RunOutcome::Skipped(_)) => summary.skipped += 1,
                Err(e) => {
                    error!("Error processing file {:?}: {}", video_file, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Folder complete in {}: {} generated, {} skipped, {} failed",
            Self::format_duration(start_time.elapsed()),
            summary.generated,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }

    /// Load saved detections when they match the video, otherwise call the provider
    async fn obtain_detections(
        &self,
        input: &VideoInput,
        paths: &OutputPaths,
        force_overwrite: bool,
        multi_progress: &MultiProgress,
    ) -> Result<(Vec<RawDetection>, bool)> {
        let output = &self.config.output;
        let track_hash = output.save_annotations || output.reuse_annotations;

        let video_hash = match input {
            VideoInput::File(path) if track_hash => Some(FileManager::sha256_file(path)?),
            _ => None,
        };

        if output.reuse_annotations && !force_overwrite && paths.annotations.exists() {
            if let Some(hash) = &video_hash {
                match AnnotationSet::load(&paths.annotations) {
                    Ok(set) if set.matches_video_hash(hash) => {
                        info!("Reusing saved detections from {:?}", paths.annotations);
                        return Ok((set.detections, true));
                    }
                    Ok(_) => debug!("Saved detections in {:?} belong to different content", paths.annotations),
                    Err(e) => warn!("Ignoring unreadable annotation file: {}", e),
                }
            }
        }

        let source = match input {
            VideoInput::File(path) => VideoSource::Content(tokio::fs::read(path).await.map_err(AppError::from)?),
            VideoInput::Uri(uri) => VideoSource::Uri(uri.clone()),
        };
        let request = AnnotationRequest::new(source)
            .with_language_hints(self.config.annotation.normalized_language_hints()?);

        let spinner = multi_progress.add(ProgressBar::new_spinner());
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message(format!("Detecting text: {}", input.display_name()));

        let result = self.provider.annotate(request).await;
        spinner.finish_and_clear();
        let detections = result.map_err(AppError::from)?;

        info!("{} returned {} detections for {}", self.provider.name(), detections.len(), input.display_name());

        if output.save_annotations {
            let mut set = AnnotationSet::new(input.display_name(), self.provider.name(), detections.clone());
            if let Some(hash) = video_hash {
                set = set.with_video_sha256(hash);
            }
            set.save(&paths.annotations)?;
            debug!("Saved detections to {:?}", paths.annotations);
        }

        Ok((detections, false))
    }

    /// Synthesize and write the subtitle file plus the optional segment listing
    fn write_outputs(
        &self,
        video_name: &str,
        detections: &[RawDetection],
        paths: &OutputPaths,
        reused_annotations: bool,
    ) -> Result<ProcessSummary> {
        let track = SubtitleTrack::new(video_name, self.synthesizer.synthesize(detections));

        if track.is_empty() {
            warn!("No qualifying text found in {}, writing an empty subtitle file", video_name);
        } else {
            debug!("{} cues cover {:.1}s of {}", track.cues.len(), track.total_cue_duration(), video_name);
        }

        // A persisted .srt always has its listing beside it
        if self.config.output.write_segments_log {
            track
                .write_segments_log(&paths.segments)
                .map_err(|e| AppError::processing_failed(video_name, &e))?;
        }
        track
            .write_to_srt(&paths.srt)
            .map_err(|e| AppError::processing_failed(video_name, &e))?;

        Ok(ProcessSummary {
            srt_path: paths.srt.clone(),
            detections: detections.len(),
            segments: track.segments.len(),
            cues: track.cues.len(),
            reused_annotations,
        })
    }

    /// Format a duration for log messages
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
