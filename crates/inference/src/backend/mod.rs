use ndarray::{Array, ArrayD, IxDyn};
use serde::Deserialize;

#[cfg(feature = "ort-backend")]
pub mod ort;

/// Hardware the ONNX Runtime session executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
}

/// Tensor names of the detection graph. Exports differ in naming (some
/// converters append `:0`), so the names come from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelIo {
    pub input: String,
    pub boxes: String,
    pub classes: String,
    pub scores: String,
}

impl Default for ModelIo {
    fn default() -> Self {
        Self {
            input: "normalized_input_image_tensor".to_string(),
            boxes: "detection_boxes".to_string(),
            classes: "detection_classes".to_string(),
            scores: "detection_scores".to_string(),
        }
    }
}

pub trait InferenceBackend: Send {
    fn load_model(path: &str) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Run the network on a normalized RGB tensor, `[1, 3, H, W]` or
    /// `[1, H, W, 3]` depending on the configured layout.
    fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput>;
}

/// Raw SSD output in the TensorFlow Object Detection API layout.
pub struct InferenceOutput {
    pub boxes: ArrayD<f32>, // [1, N, 4] (ymin, xmin, ymax, xmax) normalized 0-1
    pub classes: ArrayD<f32>, // [1, N] index into the class label table
    pub scores: ArrayD<f32>, // [1, N] confidence 0-1
}
