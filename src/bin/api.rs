use music_store_agent::{
    agent::build_agent,
    api::start_server,
    config::{AgentConfig, DEFAULT_LOG_FILTER},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .init();

    let config = AgentConfig::from_env()?;

    if config.llm.api_key.is_empty() {
        warn!("OPENAI_API_KEY not set in .env; model calls will fail");
    }

    info!("🚀 Music Store Agent - API Server");
    info!("📍 Port: {}", config.api_port);
    info!(model = %config.llm.model, "📥 Loading catalogue from {}", config.chinook_sql_url);

    let agent = Arc::new(build_agent(&config).await?);

    info!("✅ Agent initialized");
    info!("📡 Starting API server...");

    start_server(agent, config.api_port).await?;

    Ok(())
}
