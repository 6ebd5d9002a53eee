mod aggregate;
mod auth;
mod cli;
mod error;
mod log_store;
mod metric_store;
mod models;
mod pipeline;
mod providers;
mod reader;
mod report;
mod window;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting MTTRLens - build reliability metrics");
    cli.execute().await?;

    Ok(())
}
