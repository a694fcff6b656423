//! Digest web view. Serves the last generated feed (`/`, `/api/news`) from
//! the store; the curator binary regenerates the feed after each collection
//! pass, so this process only ever reads.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use digest_curator::config::{CuratorConfig, DEFAULT_CONFIG_PATH};
use digest_curator::store::NewsStore;
use digest_curator::web::create_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();

    let config = CuratorConfig::load_or_default(DEFAULT_CONFIG_PATH);
    let store = Arc::new(NewsStore::from_config(&config));

    let listener = tokio::net::TcpListener::bind(&config.web_bind).await?;
    info!(addr = %config.web_bind, "digest web view listening");
    axum::serve(listener, create_router(store)).await?;
    Ok(())
}
