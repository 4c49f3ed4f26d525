pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod labels;
pub mod output;
pub mod processing;
pub mod render;
pub mod service;

// Re-export commonly used types for convenience
pub use backend::{ExecutionProvider, InferenceBackend, InferenceOutput, ModelIo};
pub use config::{DetectorConfig, TensorLayout};
pub use error::DetectionError;
pub use labels::ClassLabelTable;
pub use processing::post::{BoundingBox, Detection, RawDetection};
pub use service::{DetectedObject, DetectionResponse, DetectionService};
