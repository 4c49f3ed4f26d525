use crate::{config::ServerConfig, routes::router, state::AppState};
use inference::InferenceBackend;

pub async fn run_server<B: InferenceBackend + 'static>(
    config: &ServerConfig,
    state: AppState<B>,
) -> anyhow::Result<()> {
    let app = router(state, config.max_body_bytes);

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("HTTP server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
