use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::annotation::{RawDetection, TimeOffset, TimedSegment};
use crate::app_config::AnnotationConfig;
use crate::errors::ProviderError;
use crate::providers::{AnnotationProvider, AnnotationRequest, VideoSource};

const TEXT_DETECTION_FEATURE: &str = "TEXT_DETECTION";

/// Google Cloud Video Intelligence client for text detection
pub struct VideoIntelligence {
    /// HTTP client for API requests
    client: Client,
    /// Service base URL, always ending with a slash
    base_url: Url,
    /// API key sent as the `key` query parameter
    api_key: String,
    /// OAuth access token sent as a bearer token
    access_token: String,
    /// Maximum number of retry attempts for transient failures
    max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
    /// Delay between operation polls
    poll_interval: Duration,
    /// Number of polls before giving up on an operation
    max_poll_attempts: u32,
}

impl fmt::Debug for VideoIntelligence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoIntelligence")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &(!self.api_key.is_empty()).then_some("<redacted>"))
            .field("access_token", &(!self.access_token.is_empty()).then_some("<redacted>"))
            .field("max_retries", &self.max_retries)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish()
    }
}

/// `videos:annotate` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateVideoRequest {
    /// Base64 encoded video content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_content: Option<String>,

    /// Cloud storage URI of the video
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_uri: Option<String>,

    /// Requested features
    pub features: Vec<String>,

    /// Feature-specific settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_context: Option<VideoContext>,
}

impl AnnotateVideoRequest {
    /// Build a text-detection request
    pub fn text_detection(source: &VideoSource, language_hints: &[String]) -> Self {
        let (input_content, input_uri) = match source {
            VideoSource::Content(bytes) => (Some(general_purpose::STANDARD.encode(bytes)), None),
            VideoSource::Uri(uri) => (None, Some(uri.clone())),
        };

        let video_context = (!language_hints.is_empty()).then(|| VideoContext {
            text_detection_config: TextDetectionConfig {
                language_hints: language_hints.to_vec(),
            },
        });

        Self {
            input_content,
            input_uri,
            features: vec![TEXT_DETECTION_FEATURE.to_string()],
            video_context,
        }
    }
}

/// Video context of an annotate request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoContext {
    /// Text detection settings
    pub text_detection_config: TextDetectionConfig,
}

/// Text detection settings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDetectionConfig {
    /// BCP-47 language hints
    pub language_hints: Vec<String>,
}

/// Long-running operation returned by `videos:annotate` and by polling
#[derive(Debug, Deserialize)]
pub struct Operation {
    /// Operation resource name
    #[serde(default)]
    pub name: String,

    /// Whether the operation has finished
    #[serde(default)]
    pub done: bool,

    /// Progress information
    #[serde(default)]
    pub metadata: Option<OperationMetadata>,

    /// Failure status when the operation failed
    #[serde(default)]
    pub error: Option<RpcStatus>,

    /// Result when the operation succeeded
    #[serde(default)]
    pub response: Option<AnnotateVideoResponse>,
}

/// Operation metadata
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationMetadata {
    /// Progress per video
    #[serde(default)]
    pub annotation_progress: Vec<AnnotationProgress>,
}

/// Progress of one video
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationProgress {
    /// Percent done, absent until work starts
    #[serde(default)]
    pub progress_percent: Option<u32>,
}

/// google.rpc.Status
#[derive(Debug, Deserialize)]
pub struct RpcStatus {
    /// Status code
    #[serde(default)]
    pub code: i32,
    /// Developer-facing message
    #[serde(default)]
    pub message: String,
}

/// Error envelope of a failed HTTP call
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: RpcStatus,
}

/// Completed annotation result
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotateVideoResponse {
    /// One entry per annotated video
    #[serde(default)]
    pub annotation_results: Vec<VideoAnnotationResults>,
}

/// Annotations for one video
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnnotationResults {
    /// Text detections
    #[serde(default)]
    pub text_annotations: Vec<TextAnnotation>,

    /// Per-video failure, if any
    #[serde(default)]
    pub error: Option<RpcStatus>,
}

/// A detected text with its segments
#[derive(Debug, Deserialize)]
pub struct TextAnnotation {
    /// Detected text
    #[serde(default)]
    pub text: String,

    /// Where the text was seen
    #[serde(default)]
    pub segments: Vec<TextSegment>,
}

/// A text segment
#[derive(Debug, Deserialize)]
pub struct TextSegment {
    /// Time range
    #[serde(default)]
    pub segment: VideoSegment,

    /// Detection confidence
    #[serde(default)]
    pub confidence: f32,
}

/// A time range within the video
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSegment {
    /// Start offset
    #[serde(default)]
    pub start_time_offset: TimeOffset,

    /// End offset
    #[serde(default)]
    pub end_time_offset: TimeOffset,
}

impl From<TextAnnotation> for RawDetection {
    fn from(annotation: TextAnnotation) -> Self {
        let segments = annotation
            .segments
            .into_iter()
            .map(|s| TimedSegment::new(s.segment.start_time_offset, s.segment.end_time_offset, s.confidence))
            .collect();
        RawDetection::new(annotation.text, segments)
    }
}

impl AnnotateVideoResponse {
    /// All text detections across results, in response order
    pub fn into_detections(self) -> Vec<RawDetection> {
        self.annotation_results
            .into_iter()
            .flat_map(|result| {
                if let Some(error) = &result.error {
                    warn!("Annotation result reported an error: {} - {}", error.code, error.message);
                }
                result.text_annotations
            })
            .map(RawDetection::from)
            .collect()
    }
}

impl Operation {
    /// Turn a finished operation into its detections
    pub fn into_detections(self) -> Result<Vec<RawDetection>, ProviderError> {
        if let Some(error) = self.error {
            return Err(ProviderError::OperationFailed {
                code: error.code,
                message: error.message,
            });
        }

        self.response
            .map(AnnotateVideoResponse::into_detections)
            .ok_or_else(|| ProviderError::ParseError(format!(
                "operation {} completed without a response",
                self.name
            )))
    }

    fn progress_percent(&self) -> Option<u32> {
        self.metadata
            .as_ref()
            .and_then(|m| m.annotation_progress.first())
            .and_then(|p| p.progress_percent)
    }
}

impl VideoIntelligence {
    /// Create a new client
    pub fn new(endpoint: &str, api_key: impl Into<String>, access_token: impl Into<String>) -> Result<Self, ProviderError> {
        let base_url = Url::parse(&format!("{}/", endpoint.trim().trim_end_matches('/')))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url,
            api_key: api_key.into(),
            access_token: access_token.into(),
            max_retries: 3,
            backoff_base_ms: 1000,
            poll_interval: Duration::from_secs(5),
            max_poll_attempts: 360,
        })
    }

    /// Create a client from the annotation configuration
    pub fn from_config(config: &AnnotationConfig) -> Result<Self, ProviderError> {
        let mut client = Self::new(&config.endpoint, config.api_key.trim(), config.access_token.trim())?;
        client.client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        client.max_retries = config.retry_count;
        client.backoff_base_ms = config.retry_backoff_ms;
        client.poll_interval = Duration::from_millis(config.poll_interval_ms);
        client.max_poll_attempts = config.max_poll_attempts;
        Ok(client)
    }

    /// Override the polling schedule
    pub fn with_polling(mut self, poll_interval: Duration, max_poll_attempts: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_poll_attempts = max_poll_attempts;
        self
    }

    /// Override the retry schedule
    pub fn with_retries(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Absolute URL for a path under `v1/`, with the API key attached
    pub fn api_url(&self, path: &str) -> Result<Url, ProviderError> {
        let mut url = self
            .base_url
            .join(&format!("v1/{}", path.trim_start_matches('/')))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid request path '{}': {}", path, e)))?;

        if !self.api_key.is_empty() {
            url.query_pairs_mut().append_pair("key", &self.api_key);
        }

        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.access_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.access_token)
        }
    }

    /// Start a text-detection operation
    pub async fn start_annotation(&self, request: &AnnotationRequest) -> Result<Operation, ProviderError> {
        let url = self.api_url("videos:annotate")?;
        let body = serde_json::to_vec(&AnnotateVideoRequest::text_detection(&request.source, &request.language_hints))
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to serialize request: {}", e)))?;

        debug!("Starting text detection ({:?}, {} bytes of request body)", request.source, body.len());

        self.send_with_retry(|| {
            self.authorize(self.client.post(url.clone()))
                .header("Content-Type", "application/json")
                .body(body.clone())
        })
        .await
    }

    /// Fetch the current state of an operation
    pub async fn get_operation(&self, name: &str) -> Result<Operation, ProviderError> {
        let url = self.api_url(name)?;
        self.send_with_retry(|| self.authorize(self.client.get(url.clone()))).await
    }

    /// Poll an operation until it is done or the polling budget runs out
    pub async fn wait_for_operation(&self, mut operation: Operation) -> Result<Operation, ProviderError> {
        let name = operation.name.clone();
        let mut polls = 0;

        while !operation.done {
            if polls >= self.max_poll_attempts {
                return Err(ProviderError::Timeout(format!(
                    "operation {} not done after {} polls",
                    name, self.max_poll_attempts
                )));
            }

            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            operation = self.get_operation(&name).await?;
            match operation.progress_percent() {
                Some(percent) => debug!("Operation {}: {}% done", name, percent),
                None => debug!("Operation {}: waiting (poll {})", name, polls),
            }
        }

        Ok(operation)
    }

    async fn send_with_retry<T, F>(&self, build: F) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;

        loop {
            match Self::send_once(build()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff_ms = self.backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                    warn!(
                        "Video Intelligence request failed: {} - retrying in {}ms (attempt {}/{})",
                        e, backoff_ms, attempt, self.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::ConnectionError(format!("Failed to read response body: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(Self::status_error(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(500).collect();
            ProviderError::ParseError(format!("{} (body: {})", e, preview))
        })
    }

    // Request URLs carry the API key, so they never reach error text
    fn transport_error(error: reqwest::Error) -> ProviderError {
        ProviderError::ConnectionError(error.without_url().to_string())
    }

    fn status_error(status: StatusCode, body: &str) -> ProviderError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| body.chars().take(500).collect());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(message),
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
            _ => ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl AnnotationProvider for VideoIntelligence {
    fn name(&self) -> &str {
        "videointelligence"
    }

    async fn annotate(&self, request: AnnotationRequest) -> Result<Vec<RawDetection>, ProviderError> {
        let operation = self.start_annotation(&request).await?;
        debug!("Text detection operation started: {}", operation.name);

        let finished = self.wait_for_operation(operation).await?;
        let detections = finished.into_detections()?;

        debug!("Text detection returned {} detections", detections.len());
        Ok(detections)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        // Any answer other than an auth failure proves the endpoint and credentials work
        let url = self.api_url("operations/connection-test")?;
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &body));
        }

        Ok(())
    }
}
