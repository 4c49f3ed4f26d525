use common::TelemetryGuard;
use gateway::{
    config::get_configuration, logging::setup_logging, server::run_server, state::AppState,
};
use inference::{ClassLabelTable, DetectionService, DetectorConfig, render::Renderer};

#[cfg(feature = "ort-backend")]
use inference::backend::ort::OrtBackend as Backend;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The 'ort-backend' feature must be enabled to build the gateway binary");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration()?;

    let telemetry = config
        .otel_endpoint
        .as_ref()
        .map(|endpoint| TelemetryGuard::init("detector-gateway", endpoint, config.environment))
        .transpose()?;

    if telemetry.is_none() {
        setup_logging(&config);
    }

    tracing::info!(config = ?config, "Loaded configuration");

    tracing::info!("Loading detection model");
    let backend = Backend::load_model_with_provider(
        &config.model.path,
        config.model.execution_provider,
        config.model.intra_threads,
        config.model.tensors.clone(),
    )?;
    tracing::info!("Model loaded successfully");

    let labels = ClassLabelTable::load(&config.model.labels_path)?;
    let font = Renderer::load_font_with_fallback(&config.model.font_path)?;

    let detector = DetectionService::new(
        backend,
        labels,
        font,
        &config.output.path,
        DetectorConfig {
            input_layout: config.model.input_layout,
            ..DetectorConfig::default()
        },
    );

    run_server(&config.server, AppState::new(detector)).await
}
