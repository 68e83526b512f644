//! Proof Chain Server
//!
//! Serves the identity-binding API over HTTP.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use proof_chain::{
    api::{run_server, AppState},
    validator::{ContentSource, HeadlessSource, MemorySource},
    MemoryStorage, ServiceConfig, ValidatorRegistry, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServiceConfig::from_env().context("loading configuration")?;

    info!("Proof Chain Server v{}", VERSION);
    info!("Revalidate after: {}s", config.revalidate_after.as_secs());

    let source: Arc<dyn ContentSource> = match &config.headless_url {
        Some(url) => {
            info!("Fetching proofs through headless renderer at {}", url);
            Arc::new(
                HeadlessSource::new(url.clone(), config.fetch_timeout)
                    .context("building headless renderer client")?,
            )
        }
        None => {
            warn!("PROOF_HEADLESS_URL not set; proofs are fetched from the in-process source only");
            Arc::new(MemorySource::new())
        }
    };

    let registry = ValidatorRegistry::standard(source);
    info!("Platforms: {:?}", registry.platforms());

    let state = AppState::new(Arc::new(MemoryStorage::new()), registry, config);
    run_server(state).await.context("serving HTTP")?;

    info!("Server stopped");
    Ok(())
}
