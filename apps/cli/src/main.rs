//! feedpublish CLI — classify build artifacts and push them to their feeds.
//!
//! Reads build manifests, sorts every package and blob into a feed
//! category, and publishes each category to its configured feed.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    Ok(commands::run(cli).await)
}
