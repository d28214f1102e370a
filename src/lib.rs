pub mod aggregator;
pub mod cli;
pub mod core;
pub mod providers;

use crate::aggregator::RateAggregator;
use crate::core::config::AppConfig;
use anyhow::{Context, Result};
use tracing::{debug, info};

pub enum AppCommand {
    /// Rates from every provider against `base`.
    Rates { base: String, json: bool },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Knap starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()
            .context("No usable configuration, run `knap setup` to create one")?,
    };
    debug!("Loaded config with symbols {:?}", config.symbols);

    match command {
        AppCommand::Rates { base, json } => {
            let aggregator = RateAggregator::from_config(&config)?;
            cli::rates::run(&aggregator, &base, json).await
        }
    }
}
