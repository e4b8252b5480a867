/*!
 * # ocrsub - subtitles from on-screen text
 *
 * A Rust library that turns text burned into video frames into SRT subtitles.
 *
 * ## Features
 *
 * - Detect on-screen text with Google Cloud Video Intelligence (`TEXT_DETECTION`)
 * - Filter detections by confidence and writing system (Han, Hangul, Kana, Latin, Cyrillic)
 *   or by a custom regular expression
 * - Merge repeated sightings of the same caption into single timed cues
 * - Write SRT files atomically, plus a pre-merge segment listing for tuning
 * - Save raw detections and re-synthesize later without calling the service
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `annotation`: Raw detections as delivered by the service, and saved annotation sets
 * - `synthesis`: Filtering, flattening and merging of detections into cues:
 *   - `synthesis::filter`: Confidence and script qualification
 *   - `synthesis::merge`: Gap-tolerant merging of same-text segments
 * - `subtitle_processor`: SRT timestamps, cues and subtitle files
 * - `providers`: Annotation service clients:
 *   - `providers::video_intelligence`: Google Cloud Video Intelligence REST client
 *   - `providers::mock`: Canned detections for tests and dry runs
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `file_utils`: File system operations
 * - `language_utils`: Language hint normalization
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod annotation;
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod subtitle_processor;
pub mod synthesis;

// Re-export main types for easier usage
pub use annotation::{AnnotationSet, RawDetection, TimeOffset, TimedSegment};
pub use app_config::Config;
pub use app_controller::{Controller, RunOutcome, VideoInput};
pub use subtitle_processor::{SubtitleCue, SubtitleTrack, format_timestamp};
pub use synthesis::{FlatSegment, Synthesizer};
pub use errors::{AppError, ProviderError, SubtitleError};
