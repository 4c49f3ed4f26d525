use inference::{DetectionService, InferenceBackend};
use std::sync::Arc;

/// Shared handler context. Holds the single detection service built at
/// startup; cloning only bumps the reference count.
pub struct AppState<B: InferenceBackend> {
    pub detector: Arc<DetectionService<B>>,
}

impl<B: InferenceBackend> AppState<B> {
    pub fn new(detector: DetectionService<B>) -> Self {
        Self {
            detector: Arc::new(detector),
        }
    }
}

impl<B: InferenceBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            detector: Arc::clone(&self.detector),
        }
    }
}
