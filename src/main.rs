mod builder;
mod cleaner;
mod config;
mod deployer;
mod error;
mod log_capture;
mod pipeline;
mod port_locator;
mod types;

use anyhow::Result;
use clap::Parser;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

#[tokio::main]
async fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    info!("Starting pico-loop");

    // Parse command-line arguments
    let cli = config::Cli::parse();

    // Load configuration
    let config = config::load_config(&cli)?;
    info!("Project directory: {}", config.project_dir.display());

    match pipeline::run(&config).await? {
        Some(summary) => info!(
            "Capture ended ({:?}) after {} lines",
            summary.end, summary.lines
        ),
        None => info!("No capture performed"),
    }

    Ok(())
}
