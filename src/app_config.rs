use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::synthesis::{ScriptFilter, Synthesizer};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Subtitle synthesis tuning
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Annotation service settings
    #[serde(default)]
    pub annotation: AnnotationConfig,

    /// Output files
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Tuning of the qualification filter and the adjacency merge
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// Minimum segment confidence, inclusive (0.0 to 1.0)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Largest gap in seconds between same-text segments that still merge
    #[serde(default = "default_gap_tolerance_secs")]
    pub gap_tolerance_secs: f64,

    /// Writing system detections must consist of
    #[serde(default)]
    pub script: ScriptFilter,

    /// Regular expression detections must match; overrides `script`
    #[serde(default)]
    pub text_pattern: Option<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            gap_tolerance_secs: default_gap_tolerance_secs(),
            script: ScriptFilter::default(),
            text_pattern: None,
        }
    }
}

/// Annotation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationProviderKind {
    // @provider: Google Cloud Video Intelligence
    #[default]
    VideoIntelligence,
    // @provider: Offline mock returning no detections
    Mock,
}

impl AnnotationProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::VideoIntelligence => "Video Intelligence",
            Self::Mock => "Mock",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::VideoIntelligence => "videointelligence".to_string(),
            Self::Mock => "mock".to_string(),
        }
    }
}

impl std::fmt::Display for AnnotationProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for AnnotationProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "videointelligence" | "video-intelligence" | "google" => Ok(Self::VideoIntelligence),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Annotation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnnotationConfig {
    /// Provider to use
    #[serde(default)]
    pub provider: AnnotationProviderKind,

    /// Service URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key, sent as the `key` query parameter
    #[serde(default = "String::new")]
    pub api_key: String,

    /// OAuth access token, sent as a bearer token
    #[serde(default = "String::new")]
    pub access_token: String,

    /// Language hints for text detection (ISO 639 codes, optional region)
    #[serde(default)]
    pub language_hints: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry count for transient failures
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Delay between operation status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of status polls before giving up
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Videos annotated concurrently in folder mode
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            provider: AnnotationProviderKind::default(),
            endpoint: default_endpoint(),
            api_key: String::new(),
            access_token: String::new(),
            language_hints: Vec::new(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            concurrent_requests: default_concurrent_requests(),
        }
    }
}

impl AnnotationConfig {
    /// Whether credentials for the remote service are present
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() || !self.access_token.trim().is_empty()
    }

    /// Language hints normalized for the service
    pub fn normalized_language_hints(&self) -> Result<Vec<String>> {
        self.language_hints
            .iter()
            .map(|hint| crate::language_utils::normalize_language_hint(hint))
            .collect()
    }
}

/// Output file settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    /// Directory for generated files; defaults to the video's directory
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Also write the pre-merge segment listing
    #[serde(default = "default_true")]
    pub write_segments_log: bool,

    /// Save raw detections so the video can be re-synthesized offline
    #[serde(default)]
    pub save_annotations: bool,

    /// Reuse saved detections when the video content is unchanged
    #[serde(default = "default_true")]
    pub reuse_annotations: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            write_segments_log: true,
            save_annotations: false,
            reuse_annotations: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_confidence_threshold() -> f32 {
    0.8
}

fn default_gap_tolerance_secs() -> f64 {
    1.0
}

fn default_endpoint() -> String {
    "https://videointelligence.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_max_poll_attempts() -> u32 {
    360 // 30 minutes at the default poll interval
}

fn default_concurrent_requests() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {:?}", path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        crate::file_utils::FileManager::write_atomically(path, &json)
    }

    /// Load the file if it exists, otherwise create it with defaults
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }

        let config = Self::default();
        config.save(path)?;
        Ok((config, true))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Compiles the text pattern and range-checks the tuning values
        Synthesizer::new(&self.synthesis)?;

        self.annotation.normalized_language_hints()?;

        if self.annotation.provider == AnnotationProviderKind::VideoIntelligence
            && !self.annotation.has_credentials()
        {
            return Err(anyhow!(
                "An API key or access token is required for the Video Intelligence provider"
            ));
        }

        if self.annotation.endpoint.trim().is_empty() {
            return Err(anyhow!("Annotation endpoint must not be empty"));
        }

        if self.annotation.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be greater than zero"));
        }

        if self.annotation.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be greater than zero"));
        }

        if self.annotation.max_poll_attempts == 0 {
            return Err(anyhow!("max_poll_attempts must be greater than zero"));
        }

        if self.annotation.concurrent_requests == 0 {
            return Err(anyhow!("concurrent_requests must be greater than zero"));
        }

        Ok(())
    }
}
