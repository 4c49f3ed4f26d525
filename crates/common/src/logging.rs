use crate::config::Environment;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

const DEFAULT_FILTER: &str = "info";

/// Initialize tracing with pretty output for development and JSON output for
/// production.
///
/// Filtering comes from `RUST_LOG` and defaults to `info`. The
/// OpenTelemetry layer is always installed; it is a no-op until a global
/// tracer provider exists (see [`crate::TelemetryGuard`]).
pub fn setup_logging(environment: Environment) {
    init_subscriber(environment, tracing_opentelemetry::layer());
}

pub(crate) fn init_subscriber<L>(environment: Environment, otel_layer: L)
where
    L: Layer<Layered<EnvFilter, Registry>> + Send + Sync + 'static,
{
    let registry = tracing_subscriber::registry()
        .with(env_filter())
        .with(otel_layer);

    match environment {
        Environment::Production => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_level(true))
                .init();
        }
        Environment::Development => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_ansi(true))
                .init();
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
