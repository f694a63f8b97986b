use common::{TelemetryGuard, setup_logging};
use gateway::{AppState, GatewayConfig, config::SERVICE_NAME, router};
use inference::{BackendLoader, DetectorLifecycle, backend::ort::OrtBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;

    // The guard installs the subscriber itself when exporting.
    let _telemetry = match config.otel_endpoint.as_deref() {
        Some(endpoint) => Some(TelemetryGuard::init(SERVICE_NAME, endpoint, config.environment)?),
        None => {
            setup_logging(config.environment);
            None
        }
    };

    tracing::info!(config = ?config, "Loaded configuration");

    let loader = BackendLoader::<OrtBackend>::new(config.detector.clone());
    let lifecycle = DetectorLifecycle::new(loader, config.lifecycle);

    if config.load_on_startup {
        if let Err(e) = lifecycle.load_in_background() {
            tracing::warn!(error = %e, "Background model load not started; loading on first request");
        }
    }

    let addr = config.addr.clone();
    let app = router(AppState::new(config, lifecycle));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
