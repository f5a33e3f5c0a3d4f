//! Packing-instruction webhook server.

use tracing::info;
use tracing_subscriber::EnvFilter;
use webhook_server::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn")),
        )
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting webhook server");

    let app = webhook_server::build(&config).await?;

    info!(addr = %config.addr, "Webhook server listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
