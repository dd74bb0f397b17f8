mod auth;
mod cache;
mod cli;
mod diffscan;
mod error;
mod providers;
mod report;
mod stats;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting ShipLens - delivery metrics tool");
    cli.execute().await?;

    Ok(())
}
