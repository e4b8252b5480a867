/*!
 * Text-detection annotation data model.
 *
 * These are the raw detections handed over by an annotation provider:
 * one `RawDetection` per distinct on-screen text, each carrying the time
 * segments during which that text was visible. The module also owns the
 * saved-annotations file format used to re-run synthesis offline.
 */

use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::file_utils::FileManager;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Offset from the start of the video
///
/// Missing components are treated as zero. Deserializes from either
/// `{"seconds": 12, "nanos": 500000000}` (seconds may also be a string,
/// either field may be absent) or a protobuf duration string like `"12.5s"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimeOffset {
    /// Whole seconds
    pub seconds: u64,
    /// Sub-second part in nanoseconds, always below one second
    pub nanos: u32,
}

impl TimeOffset {
    /// Create an offset, carrying excess nanoseconds into seconds
    pub fn new(seconds: u64, nanos: u64) -> Self {
        Self {
            seconds: seconds + nanos / NANOS_PER_SEC,
            nanos: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    /// Offset in seconds as a float, the canonical internal time unit
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.nanos as f64 / 1e9
    }

    /// Parse a protobuf JSON duration such as `"3s"`, `"3.5s"` or `"0.000001s"`
    pub fn parse_duration(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let body = trimmed.strip_suffix('s').unwrap_or(trimmed);
        if body.is_empty() || body.starts_with('-') {
            return None;
        }

        let (whole, fraction) = match body.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (body, ""),
        };

        let seconds = if whole.is_empty() { 0 } else { whole.parse::<u64>().ok()? };

        if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let nanos = if fraction.is_empty() {
            0
        } else {
            format!("{:0<9}", fraction).parse::<u64>().ok()?
        };

        Some(Self::new(seconds, nanos))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl NumberOrString {
    fn as_i64(&self) -> i64 {
        match self {
            Self::Integer(value) => *value,
            Self::Float(value) => value.trunc() as i64,
            Self::Text(value) => value.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireOffset {
    Duration(String),
    Parts {
        #[serde(default)]
        seconds: Option<NumberOrString>,
        #[serde(default)]
        nanos: Option<NumberOrString>,
    },
}

impl<'de> Deserialize<'de> for TimeOffset {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let offset = match Option::<WireOffset>::deserialize(deserializer)? {
            None => TimeOffset::default(),
            Some(WireOffset::Duration(text)) => TimeOffset::parse_duration(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {}", text)))?,
            Some(WireOffset::Parts { seconds, nanos }) => {
                let seconds = seconds.map_or(0, |s| s.as_i64()).max(0) as u64;
                let nanos = nanos.map_or(0, |n| n.as_i64()).max(0) as u64;
                TimeOffset::new(seconds, nanos)
            }
        };
        Ok(offset)
    }
}

/// One interval during which a detection's text was visible
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    /// When the text appeared
    #[serde(default)]
    pub start_offset: TimeOffset,

    /// When the text disappeared
    #[serde(default)]
    pub end_offset: TimeOffset,

    /// Detection confidence in [0, 1]
    #[serde(default)]
    pub confidence: f32,
}

impl TimedSegment {
    pub fn new(start_offset: TimeOffset, end_offset: TimeOffset, confidence: f32) -> Self {
        Self {
            start_offset,
            end_offset,
            confidence,
        }
    }
}

/// A single OCR text result with all the segments it was seen in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Detected text
    pub text: String,

    /// Visibility intervals, in provider order
    #[serde(default)]
    pub segments: Vec<TimedSegment>,
}

impl RawDetection {
    pub fn new(text: impl Into<String>, segments: Vec<TimedSegment>) -> Self {
        Self {
            text: text.into(),
            segments,
        }
    }
}

/// Detections saved next to the generated subtitles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationSet {
    /// Video path or URI the detections belong to
    pub video: String,

    /// SHA-256 of the video content, when it was read locally
    #[serde(default)]
    pub video_sha256: Option<String>,

    /// Name of the provider that produced the detections
    #[serde(default)]
    pub provider: String,

    /// RFC 3339 creation time
    #[serde(default)]
    pub created_at: String,

    /// The detections themselves
    pub detections: Vec<RawDetection>,
}

impl AnnotationSet {
    pub fn new(video: impl Into<String>, provider: impl Into<String>, detections: Vec<RawDetection>) -> Self {
        Self {
            video: video.into(),
            video_sha256: None,
            provider: provider.into(),
            created_at: chrono::Local::now().to_rfc3339(),
            detections,
        }
    }

    pub fn with_video_sha256(mut self, hash: impl Into<String>) -> Self {
        self.video_sha256 = Some(hash.into());
        self
    }

    /// Load a saved annotation file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = FileManager::read_to_string(path)?;
        let set: AnnotationSet = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse annotation file: {:?}", path))?;
        debug!("Loaded {} detections from {:?}", set.detections.len(), path);
        Ok(set)
    }

    /// Save the annotation file, replacing any previous one atomically
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize annotations")?;
        FileManager::write_atomically(path, &json)
    }

    /// Whether these detections were produced for content with the given hash
    pub fn matches_video_hash(&self, hash: &str) -> bool {
        self.video_sha256.as_deref() == Some(hash)
    }
}
