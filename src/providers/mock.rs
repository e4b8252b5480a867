/*!
 * Mock annotation provider for tests and dry runs.
 *
 * - `MockProvider::with_detections()` - Always returns the given detections
 * - `MockProvider::empty()` - Returns no detections
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::flaky()` - Fails for the first N calls, then succeeds
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::annotation::RawDetection;
use crate::errors::ProviderError;
use crate::providers::{AnnotationProvider, AnnotationRequest};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails the first `failures` calls with a connection error
    Flaky { failures: usize },
    /// Always fails with an API error
    Failing,
    /// Succeeds after a delay
    Slow { delay_ms: u64 },
}

/// Mock provider returning canned detections
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Detections returned on success
    detections: Vec<RawDetection>,
    /// Number of `annotate` calls so far
    request_count: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Create a mock provider with the specified behavior
    pub fn new(behavior: MockBehavior, detections: Vec<RawDetection>) -> Self {
        Self {
            behavior,
            detections,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_detections(detections: Vec<RawDetection>) -> Self {
        Self::new(MockBehavior::Working, detections)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Working, Vec::new())
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing, Vec::new())
    }

    pub fn flaky(failures: usize, detections: Vec<RawDetection>) -> Self {
        Self::new(MockBehavior::Flaky { failures }, detections)
    }

    /// How many times `annotate` has been called
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnnotationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn annotate(&self, _request: AnnotationRequest) -> Result<Vec<RawDetection>, ProviderError> {
        let call = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;

        match self.behavior {
            MockBehavior::Working => Ok(self.detections.clone()),
            MockBehavior::Flaky { failures } if call <= failures => Err(ProviderError::ConnectionError(
                format!("mock connection failure {}/{}", call, failures),
            )),
            MockBehavior::Flaky { .. } => Ok(self.detections.clone()),
            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "mock provider failure".to_string(),
            }),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.detections.clone())
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("mock provider offline".to_string())),
            _ => Ok(()),
        }
    }
}
