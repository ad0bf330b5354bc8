use defi_risk::{api, config::Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging (RUST_LOG, default info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("🚀 Starting DeFi Risk Dashboard backend...");

    let config = Config::from_env()?;

    match config.rng_seed {
        Some(seed) => tracing::info!("🎲 Generator seeded with {}", seed),
        None => tracing::info!("🎲 Generator seeded from entropy"),
    }
    tracing::info!("🔗 Live data from {}", config.llama_config.base_url);
    tracing::info!("⏱️ Feed period: {:?}", config.feed_period());

    let state = api::AppState::new(&config)?;
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("🌐 Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("✅ Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
