/*!
 * End-to-end subtitle generation through the controller with a mock provider
 */

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use ocrsub::annotation::AnnotationSet;
use ocrsub::app_config::Config;
use ocrsub::app_controller::{Controller, ProcessSummary, RunOutcome, VideoInput};
use ocrsub::errors::AppError;
use ocrsub::providers::mock::MockProvider;
use ocrsub::synthesis::ScriptFilter;

use crate::common::{self, detection, sample_detections};

const SAMPLE_SRT: &str = "1\n00:00:01,000 --> 00:00:03,000\n你好\n\n2\n00:00:04,000 --> 00:00:05,000\n世界\n\n";

fn han_config() -> Config {
    let mut config = common::test_config();
    config.synthesis.script = ScriptFilter::Han;
    config
}

fn controller(config: Config, provider: &MockProvider) -> Controller {
    Controller::with_provider(config, Arc::new(provider.clone())).unwrap()
}

fn expect_generated(outcome: RunOutcome) -> ProcessSummary {
    match outcome {
        RunOutcome::Generated(summary) => summary,
        RunOutcome::Skipped(path) => panic!("expected subtitles to be generated, skipped {:?}", path),
    }
}

#[tokio::test]
async fn test_run_withDetections_shouldWriteSrtAndSegmentListing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    let output_dir = temp_dir.path().join("subtitle");
    let provider = MockProvider::with_detections(sample_detections());

    let outcome = controller(han_config(), &provider)
        .run(VideoInput::File(video), Some(output_dir.as_path()), false)
        .await?;

    let summary = expect_generated(outcome);
    assert_eq!(summary.srt_path, output_dir.join("clip.srt"));
    assert_eq!(summary.detections, 4);
    assert_eq!(summary.segments, 3);
    assert_eq!(summary.cues, 2);
    assert!(!summary.reused_annotations);
    assert_eq!(provider.request_count(), 1);

    assert_eq!(fs::read_to_string(output_dir.join("clip.srt"))?, SAMPLE_SRT);
    let listing = fs::read_to_string(output_dir.join("clip_segments.txt"))?;
    assert_eq!(
        listing.lines().collect::<Vec<_>>(),
        vec![
            "Start: 00:00:01,000 End: 00:00:02,000 Text: 你好",
            "Start: 00:00:02,500 End: 00:00:03,000 Text: 你好",
            "Start: 00:00:04,000 End: 00:00:05,000 Text: 世界",
        ]
    );
    // Annotations are only saved on request
    assert!(!output_dir.join("clip_annotations.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withoutOutputDir_shouldWriteNextToVideo() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "videos/clip.mkv")?;
    let provider = MockProvider::with_detections(sample_detections());

    controller(han_config(), &provider)
        .run(VideoInput::File(video), None, false)
        .await?;

    assert!(temp_dir.path().join("videos/clip.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withConfiguredOutputDir_shouldUseIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    let mut config = han_config();
    config.output.output_dir = Some(temp_dir.path().join("configured"));
    config.output.write_segments_log = false;

    controller(config, &MockProvider::with_detections(sample_detections()))
        .run(VideoInput::File(video), None, false)
        .await?;

    assert!(temp_dir.path().join("configured/clip.srt").exists());
    assert!(!temp_dir.path().join("configured/clip_segments.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withNoQualifyingText_shouldWriteEmptySrt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    let provider = MockProvider::with_detections(vec![detection("LOGO", &[(0.0, 9.0, 0.99)])]);

    let summary = expect_generated(
        controller(han_config(), &provider)
            .run(VideoInput::File(video), Some(temp_dir.path()), false)
            .await?,
    );

    assert_eq!(summary.cues, 0);
    assert_eq!(fs::read_to_string(temp_dir.path().join("clip.srt"))?, "");
    assert_eq!(fs::read_to_string(temp_dir.path().join("clip_segments.txt"))?, "");
    Ok(())
}

#[tokio::test]
async fn test_run_withExistingSrt_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    let existing = common::create_test_file(temp_dir.path(), "clip.srt", b"keep me")?;
    let provider = MockProvider::with_detections(sample_detections());
    let controller = controller(han_config(), &provider);

    let outcome = controller
        .run(VideoInput::File(video.clone()), Some(temp_dir.path()), false)
        .await?;
    assert_eq!(outcome, RunOutcome::Skipped(existing.clone()));
    assert_eq!(provider.request_count(), 0);
    assert_eq!(fs::read_to_string(&existing)?, "keep me");

    controller
        .run(VideoInput::File(video), Some(temp_dir.path()), true)
        .await?;
    assert_eq!(provider.request_count(), 1);
    assert_eq!(fs::read_to_string(&existing)?, SAMPLE_SRT);
    Ok(())
}

#[tokio::test]
async fn test_run_withFailingProvider_shouldWriteNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "clip.mp4")?;

    let error = controller(han_config(), &MockProvider::failing())
        .run(VideoInput::File(video), Some(temp_dir.path()), false)
        .await
        .unwrap_err();

    match error.downcast_ref::<AppError>() {
        Some(AppError::ProcessingFailed { input, reason }) => {
            assert!(input.ends_with("clip.mp4"));
            assert!(reason.contains("mock provider failure"));
        }
        other => panic!("expected a processing failure, got {:?}", other),
    }
    assert!(!temp_dir.path().join("clip.srt").exists());
    assert!(!temp_dir.path().join("clip_segments.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withUnwritableSegmentsLog_shouldFailWithoutSubtitles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    // A directory in the listing's place makes the write fail
    common::create_test_file(&temp_dir.path().join("clip_segments.txt"), "occupied", b"")?;

    let error = controller(han_config(), &MockProvider::with_detections(sample_detections()))
        .run(VideoInput::File(video), Some(temp_dir.path()), false)
        .await
        .unwrap_err();

    match error.downcast_ref::<AppError>() {
        Some(AppError::ProcessingFailed { input, .. }) => assert!(input.ends_with("clip.mp4")),
        other => panic!("expected a processing failure, got {:?}", other),
    }
    assert!(!temp_dir.path().join("clip.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_run_withMissingVideo_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = MockProvider::with_detections(sample_detections());

    let result = controller(han_config(), &provider)
        .run(VideoInput::File(temp_dir.path().join("missing.mp4")), None, false)
        .await;

    assert!(result.is_err());
    assert_eq!(provider.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_run_withCloudUri_shouldNameOutputsAfterObject() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = MockProvider::with_detections(sample_detections());

    let summary = expect_generated(
        controller(han_config(), &provider)
            .run(VideoInput::parse("gs://bucket/clips/20240327.mp4"), Some(temp_dir.path()), false)
            .await?,
    );

    assert_eq!(summary.srt_path, temp_dir.path().join("20240327.srt"));
    assert_eq!(fs::read_to_string(&summary.srt_path)?, SAMPLE_SRT);
    Ok(())
}

#[tokio::test]
async fn test_run_withSavedAnnotations_shouldReuseThemForUnchangedVideo() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    let mut config = han_config();
    config.output.save_annotations = true;

    let provider = MockProvider::with_detections(sample_detections());
    controller(config.clone(), &provider)
        .run(VideoInput::File(video.clone()), Some(temp_dir.path()), false)
        .await?;

    let saved = AnnotationSet::load(temp_dir.path().join("clip_annotations.json"))?;
    assert_eq!(saved.provider, "mock");
    assert_eq!(saved.detections, sample_detections());
    assert!(saved.video_sha256.is_some());

    // A second run must not need the service at all
    fs::remove_file(temp_dir.path().join("clip.srt"))?;
    let offline = MockProvider::failing();
    let summary = expect_generated(
        controller(config, &offline)
            .run(VideoInput::File(video), Some(temp_dir.path()), false)
            .await?,
    );

    assert!(summary.reused_annotations);
    assert_eq!(offline.request_count(), 0);
    assert_eq!(fs::read_to_string(temp_dir.path().join("clip.srt"))?, SAMPLE_SRT);
    Ok(())
}

#[tokio::test]
async fn test_run_withChangedVideo_shouldIgnoreSavedAnnotations() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let video = common::create_test_video(temp_dir.path(), "clip.mp4")?;
    AnnotationSet::new("clip.mp4", "mock", vec![detection("旧的", &[(1.0, 2.0, 0.9)])])
        .with_video_sha256("0000")
        .save(temp_dir.path().join("clip_annotations.json"))?;

    let provider = MockProvider::with_detections(sample_detections());
    let summary = expect_generated(
        controller(han_config(), &provider)
            .run(VideoInput::File(video), Some(temp_dir.path()), false)
            .await?,
    );

    assert!(!summary.reused_annotations);
    assert_eq!(provider.request_count(), 1);
    assert_eq!(fs::read_to_string(temp_dir.path().join("clip.srt"))?, SAMPLE_SRT);
    Ok(())
}

#[tokio::test]
async fn test_resynthesize_withNewThreshold_shouldRebuildWithoutProvider() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let annotations = temp_dir.path().join("saved/clip_annotations.json");
    AnnotationSet::new("/videos/clip.mp4", "videointelligence", sample_detections()).save(&annotations)?;

    let mut config = han_config();
    config.synthesis.confidence_threshold = 0.5;
    let provider = MockProvider::failing();

    let summary = expect_generated(controller(config, &provider).resynthesize(&annotations, None, false)?);

    // The 0.5 sighting now qualifies but still merges into the first cue
    assert_eq!(summary.srt_path, temp_dir.path().join("saved/clip.srt"));
    assert_eq!(summary.segments, 4);
    assert_eq!(summary.cues, 2);
    assert!(summary.reused_annotations);
    assert_eq!(provider.request_count(), 0);
    assert_eq!(
        fs::read_to_string(&summary.srt_path)?,
        "1\n00:00:01,000 --> 00:00:03,400\n你好\n\n2\n00:00:04,000 --> 00:00:05,000\n世界\n\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_resynthesize_withExistingSrt_shouldSkipUnlessForced() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let annotations = temp_dir.path().join("clip_annotations.json");
    AnnotationSet::new("clip.mp4", "mock", sample_detections()).save(&annotations)?;
    common::create_test_file(temp_dir.path(), "clip.srt", b"old")?;

    let controller = controller(han_config(), &MockProvider::empty());

    assert!(matches!(
        controller.resynthesize(&annotations, None, false)?,
        RunOutcome::Skipped(_)
    ));
    expect_generated(controller.resynthesize(&annotations, None, true)?);
    assert_eq!(fs::read_to_string(temp_dir.path().join("clip.srt"))?, SAMPLE_SRT);
    Ok(())
}

#[tokio::test]
async fn test_runFolder_shouldProcessEveryVideoAndCountOutcomes() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input_dir = temp_dir.path().join("videos");
    let output_dir = temp_dir.path().join("subtitle");
    for name in ["a.mp4", "b.mkv", "nested/c.webm"] {
        common::create_test_video(&input_dir, name)?;
    }
    common::create_test_file(&input_dir, "notes.txt", b"ignored")?;
    common::create_test_file(&output_dir, "b.srt", b"done already")?;

    let provider = MockProvider::with_detections(sample_detections());
    let summary = controller(han_config(), &provider)
        .run_folder(&input_dir, Some(output_dir.as_path()), false)
        .await?;

    assert_eq!(summary.generated, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(provider.request_count(), 2);
    for name in ["a.srt", "nested/c.srt"] {
        assert_eq!(fs::read_to_string(output_dir.join(name))?, SAMPLE_SRT);
    }
    assert_eq!(fs::read_to_string(output_dir.join("b.srt"))?, "done already");
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withRepeatedStems_shouldKeepEverySubtitle() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input_dir = temp_dir.path().join("videos");
    let output_dir = temp_dir.path().join("subtitle");
    for name in ["a/clip.mp4", "b/clip.mp4"] {
        common::create_test_video(&input_dir, name)?;
    }

    let summary = controller(han_config(), &MockProvider::with_detections(sample_detections()))
        .run_folder(&input_dir, Some(output_dir.as_path()), false)
        .await?;

    assert_eq!(summary.generated, 2);
    for dir in ["a", "b"] {
        assert_eq!(fs::read_to_string(output_dir.join(dir).join("clip.srt"))?, SAMPLE_SRT);
        assert!(output_dir.join(dir).join("clip_segments.txt").exists());
    }
    assert!(!output_dir.join("clip.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withFailingProvider_shouldCountFailures() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    for name in ["a.mp4", "b.mp4"] {
        common::create_test_video(temp_dir.path(), name)?;
    }

    let summary = controller(han_config(), &MockProvider::failing())
        .run_folder(temp_dir.path(), None, false)
        .await?;

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.generated, 0);
    assert!(!temp_dir.path().join("a.srt").exists());
    Ok(())
}

#[tokio::test]
async fn test_runFolder_withoutVideos_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_test_file(temp_dir.path(), "readme.txt", b"nothing here")?;
    let controller = controller(han_config(), &MockProvider::empty());

    assert!(controller.run_folder(temp_dir.path(), None, false).await.is_err());
    assert!(controller.run_folder(&temp_dir.path().join("missing"), None, false).await.is_err());
    Ok(())
}

#[test]
fn test_testConnection_shouldReportProviderState() {
    let (online, offline) = tokio_test::block_on(async {
        (
            controller(han_config(), &MockProvider::empty()).test_connection().await,
            controller(han_config(), &MockProvider::failing()).test_connection().await,
        )
    });

    assert!(online.is_ok());
    assert!(offline.is_err());
}

#[test]
fn test_withConfig_withInvalidSynthesisSettings_shouldFail() {
    let mut config = common::test_config();
    config.synthesis.gap_tolerance_secs = f64::NAN;

    assert!(Controller::with_config(config).is_err());
    assert!(Controller::with_config(common::test_config()).is_ok());
}
