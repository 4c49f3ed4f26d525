use crate::{
    backend::InferenceBackend,
    config::DetectorConfig,
    engine::InferenceEngine,
    error::DetectionError,
    labels::ClassLabelTable,
    output::OutputStore,
    processing::post::Detection,
    render::Renderer,
};
use ab_glyph::FontVec;
use common::span;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::RgbImage;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// A detection as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub label: String,
    pub confidence: f32,
    pub area_ratio: f32,
}

impl From<&Detection> for DetectedObject {
    fn from(detection: &Detection) -> Self {
        Self {
            label: detection.label.clone(),
            confidence: detection.confidence,
            area_ratio: detection.area_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub objects: Vec<DetectedObject>,
}

struct DetectionMetrics {
    duration: Histogram<f64>,
    requests: Counter<u64>,
    objects: Counter<u64>,
}

impl DetectionMetrics {
    fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 0.75, 1.0, 2.0, 5.0,
        ];

        Self {
            duration: meter
                .f64_histogram("detection_duration_seconds")
                .with_description("Time to process one image (decode excluded)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
            requests: meter
                .u64_counter("detection_requests_total")
                .with_description("Total images processed")
                .build(),
            objects: meter
                .u64_counter("detection_objects_total")
                .with_description("Total objects returned after suppression")
                .build(),
        }
    }
}

/// Process-wide detection context: the loaded model, label table, colour
/// palette and output location. Built once at startup and shared.
pub struct DetectionService<B: InferenceBackend> {
    engine: Mutex<InferenceEngine<B>>,
    labels: ClassLabelTable,
    renderer: Renderer,
    output: OutputStore,
    metrics: DetectionMetrics,
}

impl<B: InferenceBackend> DetectionService<B> {
    pub fn new(
        backend: B,
        labels: ClassLabelTable,
        font: Option<FontVec>,
        output_path: impl Into<PathBuf>,
        config: DetectorConfig,
    ) -> Self {
        let renderer = Renderer::new(labels.len(), config.color_seed, font);
        Self {
            engine: Mutex::new(InferenceEngine::new(backend, &config)),
            labels,
            renderer,
            output: OutputStore::new(output_path),
            metrics: DetectionMetrics::new("detector"),
        }
    }

    /// Detect objects in a base64 encoded image.
    #[tracing::instrument(skip_all, fields(payload_len = payload.len()))]
    pub fn detect_from_base64(&self, payload: &str) -> Result<DetectionResponse, DetectionError> {
        let image = decode_base64_image(payload).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected base64 image");
        })?;
        self.detect(image)
    }

    /// Detect objects in the raw bytes of an uploaded image file.
    #[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn detect_from_upload(&self, bytes: &[u8]) -> Result<DetectionResponse, DetectionError> {
        let image = decode_image(bytes).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected uploaded image");
        })?;
        self.detect(image)
    }

    /// PNG bytes of the most recent annotated image.
    pub fn output_image(&self) -> Result<Vec<u8>, DetectionError> {
        self.output.read()
    }

    fn detect(&self, mut image: RgbImage) -> Result<DetectionResponse, DetectionError> {
        let _s = span!("detect_objects");
        let start = Instant::now();
        let (width, height) = image.dimensions();

        let (candidates, detections) = {
            // Engine state carries nothing between runs, so it stays usable
            // after a run panicked while holding the lock.
            let mut engine = self.engine.lock().unwrap_or_else(|poisoned| {
                tracing::warn!("Inference engine lock was poisoned by a panic, recovering");
                PoisonError::into_inner(poisoned)
            });
            let candidates = engine.detect(&image).map_err(DetectionError::Inference)?;
            let detections = engine
                .postprocessor()
                .process(&candidates, width, height, &self.labels);
            (candidates.len(), detections)
        };

        self.renderer.annotate(&mut image, &detections);
        self.output.write(&image)?;

        self.metrics
            .duration
            .record(start.elapsed().as_secs_f64(), &[]);
        self.metrics.requests.add(1, &[]);
        self.metrics.objects.add(detections.len() as u64, &[]);

        tracing::info!(
            width,
            height,
            candidates,
            objects = detections.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Detection complete"
        );

        Ok(DetectionResponse {
            objects: detections.iter().map(DetectedObject::from).collect(),
        })
    }
}

/// Decode a base64 payload (standard alphabet, padded). ASCII whitespace,
/// such as the line breaks some encoders insert, is ignored.
pub fn decode_base64_image(payload: &str) -> Result<RgbImage, DetectionError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD.decode(compact)?;
    decode_image(&bytes)
}

/// Decode any supported raster format into a three-channel RGB image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, DetectionError> {
    let image = image::load_from_memory(bytes)
        .map_err(DetectionError::InvalidImage)?
        .to_rgb8();

    if image.width() == 0 || image.height() == 0 {
        return Err(DetectionError::EmptyImage);
    }

    Ok(image)
}
