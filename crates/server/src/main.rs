use std::sync::Arc;

use analysis_engine::AnalysisService;
use server::clients::lichess::LichessClient;
use server::config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    // Missing engine or cache store degrades the chain, never aborts startup
    let service = Arc::new(AnalysisService::from_config(&config.analysis).await?);
    let lichess = Arc::new(LichessClient::new(config.lichess_api_token.clone())?);

    let app = server::app(service.clone(), lichess);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    service.shutdown().await;
    Ok(())
}
