// HBNB - Web Server
// REST API with Axum over the configured storage backend

use anyhow::{Context, Result};
use hbnb::api::{router, AppState};
use hbnb::{logging, storage, Config};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init(std::env::var("HBNB_VERBOSE").is_ok());

    let config = Config::from_env().context("Failed to read configuration")?;
    let store = storage::open(&config).context("Failed to open storage")?;
    let app = router(AppState::new(store));

    let host = std::env::var("HBNB_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("HBNB_API_PORT").unwrap_or_else(|_| "5000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, storage = ?config.storage, "server listening");
    println!("🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/v1/states", addr);

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
