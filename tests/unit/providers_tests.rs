/*!
 * Tests for annotation provider wire formats and the mock provider
 */

use std::sync::Arc;

use ocrsub::annotation::TimeOffset;
use ocrsub::app_config::{AnnotationConfig, AnnotationProviderKind};
use ocrsub::errors::ProviderError;
use ocrsub::providers::mock::{MockBehavior, MockProvider};
use ocrsub::providers::video_intelligence::{AnnotateVideoRequest, Operation, VideoIntelligence};
use ocrsub::providers::{self, AnnotationProvider, AnnotationRequest, VideoSource};

use crate::common::detection;

const FINISHED_OPERATION: &str = r#"{
  "name": "projects/123/locations/us-east1/operations/456",
  "metadata": {
    "@type": "type.googleapis.com/google.cloud.videointelligence.v1.AnnotateVideoProgress",
    "annotationProgress": [{"inputUri": "/bucket/clip.mp4", "progressPercent": 100}]
  },
  "done": true,
  "response": {
    "@type": "type.googleapis.com/google.cloud.videointelligence.v1.AnnotateVideoResponse",
    "annotationResults": [{
      "inputUri": "/bucket/clip.mp4",
      "textAnnotations": [
        {
          "text": "你好",
          "segments": [
            {
              "segment": {
                "startTimeOffset": {"seconds": "1", "nanos": 500000000},
                "endTimeOffset": {"seconds": "3"}
              },
              "confidence": 0.97,
              "frames": [{"timeOffset": {"seconds": "1", "nanos": 500000000}}]
            },
            {
              "segment": {"startTimeOffset": {"nanos": 200000000}, "endTimeOffset": {"nanos": 900000000}},
              "confidence": 0.6
            }
          ]
        },
        {
          "text": "LOGO",
          "segments": [
            {"segment": {"startTimeOffset": "0s", "endTimeOffset": "12.250s"}, "confidence": 0.99}
          ]
        }
      ]
    }]
  }
}"#;

#[test]
fn test_operation_parse_withFinishedResponse_shouldYieldDetections() {
    let operation: Operation = serde_json::from_str(FINISHED_OPERATION).unwrap();
    assert!(operation.done);

    let detections = operation.into_detections().unwrap();
    assert_eq!(detections.len(), 2);

    let hello = &detections[0];
    assert_eq!(hello.text, "你好");
    assert_eq!(hello.segments.len(), 2);
    assert_eq!(hello.segments[0].start_offset, TimeOffset::new(1, 500_000_000));
    assert_eq!(hello.segments[0].end_offset, TimeOffset::new(3, 0));
    assert_eq!(hello.segments[0].confidence, 0.97);
    assert_eq!(hello.segments[1].start_offset, TimeOffset::new(0, 200_000_000));

    let logo = &detections[1];
    assert_eq!(logo.segments[0].end_offset, TimeOffset::new(12, 250_000_000));
}

#[test]
fn test_operation_parse_withError_shouldFailWithOperationError() {
    let operation: Operation = serde_json::from_str(
        r#"{"name": "operations/9", "done": true, "error": {"code": 3, "message": "Invalid video"}}"#,
    )
    .unwrap();

    match operation.into_detections() {
        Err(ProviderError::OperationFailed { code, message }) => {
            assert_eq!(code, 3);
            assert_eq!(message, "Invalid video");
        }
        other => panic!("expected an operation failure, got {:?}", other),
    }
}

#[test]
fn test_operation_parse_withoutResponse_shouldFail() {
    let operation: Operation = serde_json::from_str(r#"{"name": "operations/9", "done": true}"#).unwrap();
    assert!(matches!(operation.into_detections(), Err(ProviderError::ParseError(_))));
}

#[test]
fn test_operation_parse_withNoText_shouldYieldNoDetections() {
    let operation: Operation = serde_json::from_str(
        r#"{"name": "operations/9", "done": true, "response": {"annotationResults": [{"inputUri": "/b/c.mp4"}]}}"#,
    )
    .unwrap();
    assert!(operation.into_detections().unwrap().is_empty());
}

#[test]
fn test_annotateRequest_withContent_shouldEncodeBase64() {
    let request = AnnotateVideoRequest::text_detection(&VideoSource::Content(b"abc".to_vec()), &[]);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["inputContent"], "YWJj");
    assert!(json.get("inputUri").is_none());
    assert_eq!(json["features"], serde_json::json!(["TEXT_DETECTION"]));
    assert!(json.get("videoContext").is_none());
}

#[test]
fn test_annotateRequest_withUriAndHints_shouldSetVideoContext() {
    let hints = vec!["zh".to_string(), "zh-TW".to_string()];
    let request = AnnotateVideoRequest::text_detection(&VideoSource::Uri("gs://bucket/clip.mp4".to_string()), &hints);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["inputUri"], "gs://bucket/clip.mp4");
    assert!(json.get("inputContent").is_none());
    assert_eq!(
        json["videoContext"]["textDetectionConfig"]["languageHints"],
        serde_json::json!(["zh", "zh-TW"])
    );
}

#[test]
fn test_videoSource_debug_shouldNotDumpContent() {
    let source = VideoSource::Content(vec![0u8; 2048]);
    assert_eq!(format!("{:?}", source), "Content(2048 bytes)");
}

#[test]
fn test_videoIntelligence_debug_shouldRedactCredentials() {
    let client = VideoIntelligence::new("https://videointelligence.googleapis.com", "secret-key", "secret-token").unwrap();
    let debug = format!("{:?}", client);

    assert!(!debug.contains("secret-key"));
    assert!(!debug.contains("secret-token"));
    assert!(debug.contains("redacted"));
}

#[test]
fn test_videoIntelligence_new_withInvalidEndpoint_shouldFail() {
    assert!(matches!(
        VideoIntelligence::new("not a url", "key", ""),
        Err(ProviderError::RequestFailed(_))
    ));
}

#[test]
fn test_createProvider_shouldFollowConfiguredKind() {
    let mut config = AnnotationConfig {
        provider: AnnotationProviderKind::Mock,
        ..AnnotationConfig::default()
    };
    assert_eq!(providers::create_provider(&config).unwrap().name(), "mock");

    config.provider = AnnotationProviderKind::VideoIntelligence;
    config.api_key = "key".to_string();
    assert_eq!(providers::create_provider(&config).unwrap().name(), "videointelligence");
}

#[tokio::test]
async fn test_mockProvider_withDetections_shouldReturnThemAndCountCalls() {
    let detections = vec![detection("HELLO", &[(1.0, 2.0, 0.9)])];
    let provider = MockProvider::with_detections(detections.clone());
    let request = AnnotationRequest::new(VideoSource::Uri("gs://bucket/clip.mp4".to_string()));

    assert_eq!(provider.annotate(request.clone()).await.unwrap(), detections);
    assert_eq!(provider.annotate(request).await.unwrap(), detections);
    assert_eq!(provider.request_count(), 2);
}

#[tokio::test]
async fn test_mockProvider_flaky_shouldFailThenRecover() {
    let provider = MockProvider::flaky(2, vec![detection("HELLO", &[(1.0, 2.0, 0.9)])]);
    let request = AnnotationRequest::new(VideoSource::Content(Vec::new()));

    for _ in 0..2 {
        let error = provider.annotate(request.clone()).await.unwrap_err();
        assert!(error.is_retryable());
    }
    assert_eq!(provider.annotate(request).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_mockProvider_failing_shouldFailAnnotateAndConnectionTest() {
    let provider: Arc<dyn AnnotationProvider> = Arc::new(MockProvider::failing());
    let request = AnnotationRequest::new(VideoSource::Content(Vec::new()));

    assert!(provider.annotate(request).await.is_err());
    assert!(provider.test_connection().await.is_err());
    assert!(MockProvider::empty().test_connection().await.is_ok());
}

#[tokio::test]
async fn test_mockProvider_slow_shouldStillSucceed() {
    let provider = MockProvider::new(MockBehavior::Slow { delay_ms: 10 }, Vec::new());
    let request = AnnotationRequest::new(VideoSource::Content(Vec::new()));

    assert!(provider.annotate(request).await.unwrap().is_empty());
}
