use common::Environment;
use inference::{ExecutionProvider, ModelIo, TensorLayout};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "DETECTOR";
const DEFAULT_MAX_BODY_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    pub labels_path: String,
    pub font_path: String,
    pub execution_provider: ExecutionProvider,
    pub intra_threads: usize,
    pub input_layout: TensorLayout,
    pub tensors: ModelIo,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
    pub otel_endpoint: Option<String>,
}

/// Configuration from defaults, an optional `config/detector` file and
/// `DETECTOR_*` environment variables, in increasing precedence.
///
/// Nested keys use a double underscore, e.g. `DETECTOR_SERVER__PORT=9000`.
pub fn get_configuration() -> Result<Config, config::ConfigError> {
    load_configuration(
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    )
}

fn load_configuration(env: config::Environment) -> Result<Config, config::ConfigError> {
    let defaults = ModelIo::default();
    let config = config::Config::builder()
        .set_default("environment", "development")?
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("server.max_body_bytes", DEFAULT_MAX_BODY_BYTES)?
        .set_default("model.path", "model_data/ssd_mobilenet_v3_large_coco.onnx")?
        .set_default("model.labels_path", "model_data/coco.names")?
        .set_default("model.font_path", "model_data/font.ttf")?
        .set_default("model.execution_provider", "cpu")?
        .set_default("model.intra_threads", 4)?
        .set_default("model.input_layout", "nchw")?
        .set_default("model.tensors.input", defaults.input)?
        .set_default("model.tensors.boxes", defaults.boxes)?
        .set_default("model.tensors.classes", defaults.classes)?
        .set_default("model.tensors.scores", defaults.scores)?
        .set_default("output.path", "output/output.png")?
        .add_source(config::File::with_name("config/detector").required(false))
        .add_source(env)
        .build()?;

    config.try_deserialize::<Config>()
}
