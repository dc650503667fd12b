mod entities;
mod error;
mod services;

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::entities::config::Config;
use crate::entities::request::CreateContainerGroupRequest;
use crate::services::eci::Eci;

/// Create a GPU container group on Alibaba Cloud ECI
#[derive(Parser, Debug)]
#[command(name = "eci-launch", version)]
struct Cli {
    /// The configuration file in JSON format
    #[arg(long)]
    conf: PathBuf,

    /// Debug mode
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    debug: bool,

    /// ECI endpoint, defaults to the config region's endpoint
    #[arg(long, env = "ECI_ENDPOINT")]
    endpoint: Option<String>,

    /// Log the request without sending it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.debug { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    run(cli).await?;
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<Option<String>> {
    let config = Config::load(&cli.conf)
        .with_context(|| format!("Failed to load config '{}'", cli.conf.display()))?;
    let request = CreateContainerGroupRequest::build(&config)?;
    if cli.dry_run {
        info!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(None);
    }
    let eci = match &cli.endpoint {
        Some(endpoint) => Eci::with_endpoint(&config, endpoint)?,
        None => Eci::new(&config)?,
    };
    let response = eci
        .create_container_group(&request)
        .await
        .with_context(|| {
            format!(
                "Failed to create container group '{}'",
                config.container_group_name
            )
        })?;
    info!(
        request_id = %response.request_id,
        container_group_id = %response.container_group_id,
        "Container group created"
    );
    Ok(Some(response.container_group_id))
}
