use crate::{
    backend::{InferenceBackend, InferenceOutput},
    config::DetectorConfig,
    processing::{
        post::{PostProcessor, RawDetection},
        pre::PreProcessor,
    },
};
use image::RgbImage;

/// Loaded model plus the input/output adapters around it.
///
/// `detect` needs `&mut self` because ONNX Runtime sessions and the resize
/// scratch buffers are not shareable; callers serialize access.
pub struct InferenceEngine<B: InferenceBackend> {
    backend: B,
    preprocessor: PreProcessor,
    postprocessor: PostProcessor,
}

impl<B: InferenceBackend> InferenceEngine<B> {
    pub fn new(backend: B, config: &DetectorConfig) -> Self {
        Self {
            backend,
            preprocessor: PreProcessor::new(config),
            postprocessor: PostProcessor::new(config),
        }
    }

    /// Thresholds shared by candidate parsing and suppression.
    pub fn postprocessor(&self) -> &PostProcessor {
        &self.postprocessor
    }

    /// Candidate detections above the confidence threshold, in pixel
    /// coordinates of `image`.
    pub fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Vec<RawDetection>> {
        let (width, height) = image.dimensions();

        let input = self.preprocessor.preprocess(image)?;

        let InferenceOutput {
            boxes,
            classes,
            scores,
        } = {
            let _infer_span = tracing::info_span!("model_inference").entered();
            self.backend.infer(&input)?
        };

        self.postprocessor.parse_detections(
            &boxes.view(),
            &classes.view(),
            &scores.view(),
            width,
            height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    /// Backend that records the input shape and returns fixed outputs
    struct FixedBackend {
        seen_shapes: Vec<Vec<usize>>,
    }

    impl InferenceBackend for FixedBackend {
        fn load_model(_path: &str) -> anyhow::Result<Self> {
            Ok(Self {
                seen_shapes: Vec::new(),
            })
        }

        fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
            self.seen_shapes.push(input.shape().to_vec());
            Ok(InferenceOutput {
                boxes: Array::from_shape_vec(
                    IxDyn(&[1, 2, 4]),
                    vec![0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0],
                )?,
                classes: Array::from_shape_vec(IxDyn(&[1, 2]), vec![1.0, 2.0])?,
                scores: Array::from_shape_vec(IxDyn(&[1, 2]), vec![0.9, 0.1])?,
            })
        }
    }

    struct FailingBackend;

    impl InferenceBackend for FailingBackend {
        fn load_model(_path: &str) -> anyhow::Result<Self> {
            Ok(Self)
        }

        fn infer(&mut self, _input: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
            anyhow::bail!("session crashed")
        }
    }

    #[test]
    fn test_detect_maps_to_image_coordinates() {
        let backend = FixedBackend::load_model("unused").unwrap();
        let mut engine = InferenceEngine::new(backend, &DetectorConfig::default());

        let image = RgbImage::new(640, 480);
        let detections = engine.detect(&image).unwrap();

        assert_eq!(
            engine.backend.seen_shapes,
            vec![vec![1, 3, 320, 320]],
            "Network always sees the fixed input size"
        );
        assert_eq!(detections.len(), 1, "Low confidence output is dropped");
        assert_eq!(detections[0].class_id, 1);
        assert_eq!(detections[0].bbox.width, 320.0);
        assert_eq!(detections[0].bbox.height, 240.0);
    }

    #[test]
    fn test_nhwc_model_receives_interleaved_input() {
        let backend = FixedBackend::load_model("unused").unwrap();
        let config = DetectorConfig {
            input_layout: crate::config::TensorLayout::Nhwc,
            ..DetectorConfig::default()
        };
        let mut engine = InferenceEngine::new(backend, &config);

        let detections = engine.detect(&RgbImage::new(640, 480)).unwrap();

        assert_eq!(engine.backend.seen_shapes, vec![vec![1, 320, 320, 3]]);
        assert_eq!(detections.len(), 1, "Output parsing does not depend on input layout");
    }

    #[test]
    fn test_backend_failure_propagates() {
        let mut engine = InferenceEngine::new(FailingBackend, &DetectorConfig::default());

        let err = engine.detect(&RgbImage::new(8, 8)).unwrap_err();
        assert!(err.to_string().contains("session crashed"));
    }
}
