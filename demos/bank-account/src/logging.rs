use anyhow::anyhow;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub(crate) fn initialize(default_level: &str) -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("failed to initialize env filter: {}", e))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize subscribers: {}", e))?;

    Ok(())
}
