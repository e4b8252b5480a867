/*!
 * Subtitle synthesis from raw text detections.
 *
 * Pipeline: qualify detections (`filter`), flatten every qualifying segment
 * to a `FlatSegment`, stable-sort by start time, then fold the sorted run
 * into numbered cues (`merge`). Synthesis is pure: it performs no I/O and
 * keeps no state between calls.
 */

pub mod filter;
pub mod merge;

use log::debug;

use crate::annotation::RawDetection;
use crate::app_config::SynthesisConfig;
use crate::errors::SubtitleError;
use crate::subtitle_processor::SubtitleCue;

pub use filter::{QualificationFilter, ScriptFilter};
pub use merge::merge_segments;

/// A qualifying segment flattened to float seconds
#[derive(Debug, Clone, PartialEq)]
pub struct FlatSegment {
    /// Start in seconds
    pub start_time: f64,
    /// End in seconds
    pub end_time: f64,
    /// Text of the owning detection
    pub text: String,
}

impl FlatSegment {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
        }
    }
}

/// Sort by start time; equal starts keep their discovery order
pub fn sort_segments(segments: &mut [FlatSegment]) {
    segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
}

/// Output of one synthesis run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Synthesis {
    /// Qualifying segments in sorted order, before merging
    pub segments: Vec<FlatSegment>,
    /// Merged cues
    pub cues: Vec<SubtitleCue>,
}

/// Turns raw detections into subtitle cues
#[derive(Debug, Clone)]
pub struct Synthesizer {
    filter: QualificationFilter,
    gap_tolerance_secs: f64,
}

impl Synthesizer {
    /// Create a synthesizer from configuration, validating its settings
    pub fn new(config: &SynthesisConfig) -> Result<Self, SubtitleError> {
        if !config.gap_tolerance_secs.is_finite() || config.gap_tolerance_secs < 0.0 {
            return Err(SubtitleError::InvalidSettings(format!(
                "gap tolerance must be a non-negative number of seconds, got {}",
                config.gap_tolerance_secs
            )));
        }

        let filter = QualificationFilter::new(
            config.confidence_threshold,
            config.script,
            config.text_pattern.as_deref(),
        )?;

        Ok(Self {
            filter,
            gap_tolerance_secs: config.gap_tolerance_secs,
        })
    }

    pub fn gap_tolerance_secs(&self) -> f64 {
        self.gap_tolerance_secs
    }

    pub fn filter(&self) -> &QualificationFilter {
        &self.filter
    }

    /// Flatten qualifying segments in discovery order
    pub fn flatten(&self, detections: &[RawDetection]) -> Vec<FlatSegment> {
        detections
            .iter()
            .filter(|detection| self.filter.accepts_text(&detection.text))
            .flat_map(|detection| {
                detection
                    .segments
                    .iter()
                    .filter(|segment| self.filter.accepts_segment(segment))
                    .map(|segment| {
                        let start_time = segment.start_offset.as_secs_f64();
                        let end_time = segment.end_offset.as_secs_f64().max(start_time);
                        FlatSegment::new(start_time, end_time, detection.text.as_str())
                    })
            })
            .collect()
    }

    /// Run the full pipeline on one batch of detections
    pub fn synthesize(&self, detections: &[RawDetection]) -> Synthesis {
        let mut segments = self.flatten(detections);
        sort_segments(&mut segments);

        let cues = merge_segments(&segments, self.gap_tolerance_secs);

        debug!(
            "Synthesized {} cues from {} qualifying segments ({} detections)",
            cues.len(),
            segments.len(),
            detections.len()
        );

        Synthesis { segments, cues }
    }
}
