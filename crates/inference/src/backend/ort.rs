use super::{ExecutionProvider, InferenceBackend, InferenceOutput, ModelIo};
use ndarray::{Array, IxDyn};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::TensorRef,
};

const DEFAULT_INTRA_THREADS: usize = 4;

pub struct OrtBackend {
    session: Session,
    io: ModelIo,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &str,
        provider: ExecutionProvider,
        intra_threads: usize,
        io: ModelIo,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        #[cfg_attr(not(feature = "cuda"), allow(unused_mut))]
        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?;

        match provider {
            #[cfg(feature = "cuda")]
            ExecutionProvider::Cuda => {
                tracing::info!("Initializing ONNX Runtime with CUDA execution provider");
                builder = builder.with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default()
                        .with_device_id(0)
                        .build()
                        .error_on_failure(),
                ])?;
            }
            #[cfg(not(feature = "cuda"))]
            ExecutionProvider::Cuda => {
                anyhow::bail!("CUDA execution provider requested but the `cuda` feature is disabled");
            }
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
        }

        let session = builder.commit_from_file(path)?;

        tracing::info!(
            input = %io.input,
            boxes = %io.boxes,
            classes = %io.classes,
            scores = %io.scores,
            "Model loaded from {}",
            path
        );
        Ok(Self { session, io })
    }
}

impl InferenceBackend for OrtBackend {
    fn load_model(path: &str) -> anyhow::Result<Self> {
        Self::load_model_with_provider(
            path,
            ExecutionProvider::Cpu,
            DEFAULT_INTRA_THREADS,
            ModelIo::default(),
        )
    }

    fn infer(&mut self, input: &Array<f32, IxDyn>) -> anyhow::Result<InferenceOutput> {
        let ModelIo {
            input: input_name,
            boxes,
            classes,
            scores,
        } = &self.io;

        let outputs = self.session.run(ort::inputs![
            input_name.as_str() => TensorRef::from_array_view(input.view())?
        ])?;

        let output = |name: &str| {
            outputs
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("Model has no output named `{}`", name))
        };

        let boxes = output(boxes)?.try_extract_array()?;
        let classes = output(classes)?.try_extract_array()?;
        let scores = output(scores)?.try_extract_array()?;

        Ok(InferenceOutput {
            boxes: boxes.into_owned(),
            classes: classes.into_owned(),
            scores: scores.into_owned(),
        })
    }
}
