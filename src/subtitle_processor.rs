use std::fmt;
use std::path::Path;

use anyhow::Result;
use log::debug;

use crate::file_utils::FileManager;
use crate::synthesis::{FlatSegment, Synthesis};

// @module: Subtitle cues and SRT emission

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm)
///
/// Components are floored from the total elapsed milliseconds. Hours do not
/// wrap at 24. Negative and non-finite inputs render as zero.
pub fn format_timestamp(seconds: f64) -> String {
    // Snap to whole nanoseconds first so 1.001 stays 1001ms and 0.999999999 stays 999ms
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1e9).round() as u64 / 1_000_000
    } else {
        0
    };

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

// @struct: Single subtitle cue
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    // @field: Sequence number, from 1
    pub index: usize,

    // @field: Start time in seconds
    pub start_time: f64,

    // @field: End time in seconds
    pub end_time: f64,

    // @field: Cue text
    pub text: String,
}

impl SubtitleCue {
    pub fn new(index: usize, start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        SubtitleCue {
            index,
            start_time,
            end_time,
            text: text.into(),
        }
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        format_timestamp(self.start_time)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        format_timestamp(self.end_time)
    }

    /// Visible duration in seconds
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

impl fmt::Display for SubtitleCue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.index)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// One diagnostic line for a pre-merge segment
pub fn format_segment_line(segment: &FlatSegment) -> String {
    format!(
        "Start: {} End: {} Text: {}",
        format_timestamp(segment.start_time),
        format_timestamp(segment.end_time),
        segment.text
    )
}

/// Subtitle track synthesized for one video
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// Video path or URI the track was generated from
    pub source: String,

    /// Merged cues, numbered from 1
    pub cues: Vec<SubtitleCue>,

    /// Qualifying segments before merging, sorted by start time
    pub segments: Vec<FlatSegment>,
}

impl SubtitleTrack {
    pub fn new(source: impl Into<String>, synthesis: Synthesis) -> Self {
        SubtitleTrack {
            source: source.into(),
            cues: synthesis.cues,
            segments: synthesis.segments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Render all cues in SRT format; an empty track renders as an empty string
    pub fn to_srt_string(&self) -> String {
        self.cues.iter().map(|cue| cue.to_string()).collect()
    }

    /// Render the pre-merge diagnostic listing, one line per segment
    pub fn segments_report(&self) -> String {
        self.segments
            .iter()
            .map(|segment| format_segment_line(segment) + "\n")
            .collect()
    }

    /// Write the cues to an SRT file, replacing it atomically
    pub fn write_to_srt<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        FileManager::write_atomically(&path, &self.to_srt_string())?;
        debug!("Wrote {} cues to {:?}", self.cues.len(), path.as_ref());
        Ok(())
    }

    /// Write the diagnostic segment listing, replacing it atomically
    pub fn write_segments_log<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        FileManager::write_atomically(&path, &self.segments_report())?;
        debug!("Wrote {} segments to {:?}", self.segments.len(), path.as_ref());
        Ok(())
    }

    /// Total on-screen time covered by the cues, in seconds
    pub fn total_cue_duration(&self) -> f64 {
        self.cues.iter().map(SubtitleCue::duration).sum()
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subtitle Track")?;
        writeln!(f, "Source: {}", self.source)?;
        writeln!(f, "Segments: {}", self.segments.len())?;
        writeln!(f, "Cues: {}", self.cues.len())?;
        Ok(())
    }
}
