use crate::cli::{Args, Command};
use anyhow::{bail, Context};
use apigraph_engine::{Gateway, GatewayConfig};
use apigraph_web::ServerConfig;
use clap::Parser;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli;

const DEFAULT_LOG_LEVEL: &str = "info";

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let matches = Args::parse();
    match matches.command {
        Command::Serve { config, bind, cors } => {
            let config = load_config(&config)?;
            let gateway = Gateway::new(config)?;
            apigraph_web::serve(ServerConfig {
                gateway,
                bind,
                cors,
            })
            .await
        }
        Command::Check { config } => {
            let config = load_config(&config)?;
            check(&Gateway::new(config)?).await
        }
    }
}

/// Reads the configuration and initializes the logs with its level, unless `RUST_LOG` is set.
fn load_config(path: &Path) -> anyhow::Result<GatewayConfig> {
    let config = GatewayConfig::load(path)
        .with_context(|| format!("Unable to load the configuration {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(config)
}

async fn check(gateway: &Gateway) -> anyhow::Result<()> {
    let names = gateway.catalog().list().await?;
    let mut failures = 0;
    for name in &names {
        match gateway.catalog().load(name).await {
            Ok(descriptor) => info!(
                "Service '{name}': {} arguments, loaded from {:?}",
                descriptor.arguments.len(),
                descriptor.source
            ),
            Err(e) => {
                error!("Service '{name}': {e}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} services are invalid", names.len());
    }
    info!("{} services are valid", names.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_debug() {
        use clap::CommandFactory;

        Args::command().debug_assert()
    }
}
