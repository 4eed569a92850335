use anyhow::Result;
use turnstile::AdmissionController;
use turnstile_server::config::Config;
use turnstile_server::http::HttpServer;
use turnstile_server::middleware::AdmissionState;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from CLI arguments, environment variables and file
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("turnstile={}", config.log_level).parse()?)
                .add_directive(format!("turnstile_server={}", config.log_level).parse()?),
        )
        .init();

    let controller = AdmissionController::from_config(&config.admission)?;

    tracing::info!(
        algorithm = ?config.admission.algorithm,
        capacity_or_limit = config.admission.capacity_or_limit,
        rate_or_window = config.admission.refill_rate_per_sec_or_window_seconds,
        scope = ?config.admission.scope,
        "Turnstile server starting"
    );
    tracing::info!(
        "Reaper period: {}s, entry TTL: {}s, store capacity: {}",
        config.admission.reaper_period_secs,
        config.admission.entry_ttl_secs,
        config.admission.store_capacity
    );

    let server = HttpServer::new(&config.http.host, config.http.port)?;
    tracing::info!("Starting HTTP server on {}", server.addr());
    let state = AdmissionState::new(controller.clone(), config.trust_forwarded_for);
    let result = server.serve(state, shutdown_signal()).await;

    controller.shutdown().await;

    if let Err(e) = &result {
        tracing::error!("HTTP server failed: {}", e);
    } else {
        tracing::info!("Turnstile server shut down");
    }
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
