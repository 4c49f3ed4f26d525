use serde::Deserialize;

/// Network input resolution expected by SSD-MobileNet-v3.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (320, 320);

/// Fixed seed for the per-class colour palette so annotations keep the same
/// colours across requests and restarts.
pub const DEFAULT_COLOR_SEED: u64 = 10;

/// Memory order of the input tensor the model declares.
///
/// ONNX exports of TensorFlow graphs usually keep `[1, H, W, 3]`; graphs
/// converted from PyTorch or OpenCV blobs take `[1, 3, H, W]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// Planar `[1, 3, H, W]`
    #[default]
    Nchw,
    /// Interleaved `[1, H, W, 3]`
    Nhwc,
}

/// Tunables of the detection pipeline. Defaults reproduce the reference
/// model setup and should only change together with the model artifact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    pub input_size: (u32, u32),
    pub input_layout: TensorLayout,
    /// Multiplier applied after mean subtraction.
    pub input_scale: f32,
    /// Per-channel mean subtracted from every pixel.
    pub input_mean: f32,
    /// Minimum confidence for a raw network output to become a candidate.
    pub confidence_threshold: f32,
    /// Minimum confidence for a candidate to enter NMS.
    pub score_threshold: f32,
    /// Candidates overlapping a survivor by more than this IoU are dropped.
    pub nms_threshold: f32,
    pub color_seed: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            input_layout: TensorLayout::default(),
            input_scale: 1.0 / 127.5,
            input_mean: 127.5,
            confidence_threshold: 0.5,
            score_threshold: 0.5,
            nms_threshold: 0.2,
            color_seed: DEFAULT_COLOR_SEED,
        }
    }
}
