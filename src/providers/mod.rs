/*!
 * Annotation provider implementations.
 *
 * This module contains clients that turn a video into raw text detections:
 * - Video Intelligence: Google Cloud Video Intelligence `TEXT_DETECTION`
 * - Mock: canned detections for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::annotation::RawDetection;
use crate::app_config::{AnnotationConfig, AnnotationProviderKind};
use crate::errors::ProviderError;

pub mod mock;
pub mod video_intelligence;

/// Where the annotation service reads the video from
#[derive(Clone)]
pub enum VideoSource {
    /// Raw file content, uploaded inline
    Content(Vec<u8>),
    /// Cloud storage URI, e.g. `gs://bucket/video.mp4`
    Uri(String),
}

impl Debug for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Content(bytes) => write!(f, "Content({} bytes)", bytes.len()),
            Self::Uri(uri) => write!(f, "Uri({})", uri),
        }
    }
}

/// A request to detect text in one video
#[derive(Debug, Clone)]
pub struct AnnotationRequest {
    /// The video
    pub source: VideoSource,
    /// Normalized language hints, may be empty
    pub language_hints: Vec<String>,
}

impl AnnotationRequest {
    pub fn new(source: VideoSource) -> Self {
        Self {
            source,
            language_hints: Vec::new(),
        }
    }

    pub fn with_language_hints(mut self, hints: Vec<String>) -> Self {
        self.language_hints = hints;
        self
    }
}

/// Common trait for all annotation providers
///
/// Implementations deliver the complete detection batch for one video once
/// the remote operation has finished.
#[async_trait]
pub trait AnnotationProvider: Send + Sync + Debug {
    /// Short provider name used in logs and saved annotation files
    fn name(&self) -> &str;

    /// Detect text in a video
    ///
    /// # Arguments
    /// * `request` - The video and detection hints
    ///
    /// # Returns
    /// * `Result<Vec<RawDetection>, ProviderError>` - All detections, or an error
    async fn annotate(&self, request: AnnotationRequest) -> Result<Vec<RawDetection>, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Build the provider selected by the configuration
pub fn create_provider(config: &AnnotationConfig) -> Result<Arc<dyn AnnotationProvider>, ProviderError> {
    match config.provider {
        AnnotationProviderKind::VideoIntelligence => Ok(Arc::new(
            video_intelligence::VideoIntelligence::from_config(config)?,
        )),
        AnnotationProviderKind::Mock => Ok(Arc::new(mock::MockProvider::empty())),
    }
}
