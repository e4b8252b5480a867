/*!
 * Adjacency merge of sorted flat segments into numbered cues.
 *
 * Per-frame OCR reports the same caption many times in short, overlapping
 * pieces. A run of same-text segments whose starts fall within the gap
 * tolerance of the run's end collapses into one cue spanning the whole run.
 */

use super::FlatSegment;
use crate::subtitle_processor::SubtitleCue;

/// Merge segments sorted by start time into cues numbered from 1.
///
/// A segment extends the open cue when the text is identical and
/// `segment.start_time <= open.end_time + gap_tolerance_secs`; anything else
/// closes the open cue and starts a new one. Different-text overlaps are not
/// reconciled.
pub fn merge_segments(segments: &[FlatSegment], gap_tolerance_secs: f64) -> Vec<SubtitleCue> {
    let (mut cues, open) = segments.iter().fold(
        (Vec::new(), None::<FlatSegment>),
        |(mut cues, open), segment| match open {
            Some(mut current) if extends(&current, segment, gap_tolerance_secs) => {
                current.end_time = current.end_time.max(segment.end_time);
                (cues, Some(current))
            }
            open => {
                if let Some(current) = open {
                    emit(&mut cues, current);
                }
                (cues, Some(segment.clone()))
            }
        },
    );

    // The trailing run is still open after the walk
    if let Some(current) = open {
        emit(&mut cues, current);
    }

    cues
}

fn extends(current: &FlatSegment, segment: &FlatSegment, gap_tolerance_secs: f64) -> bool {
    current.text == segment.text && segment.start_time <= current.end_time + gap_tolerance_secs
}

fn emit(cues: &mut Vec<SubtitleCue>, run: FlatSegment) {
    let index = cues.len() + 1;
    cues.push(SubtitleCue::new(index, run.start_time, run.end_time, run.text));
}
