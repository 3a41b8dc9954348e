//! docweave - a documentation site assembler.
//!
//! Composes Markdown/HTML sources and JSON metadata into a static HTML
//! site, and optionally drives an external renderer to produce a single
//! paginated PDF.

mod build;
mod cli;
mod compose;
mod config;
mod content;
mod logger;
mod metadata;
mod nav;
mod output;
mod pdf;
mod utils;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::RunConfig;
use std::path::Path;

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    let config: &'static RunConfig = Box::leak(Box::new(load_config(cli)?));

    match &cli.command {
        Commands::Build { .. } => build::run(config),
        Commands::Check => build::check(config),
    }
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &'static Cli) -> Result<RunConfig> {
    let root = cli.input.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    let mut config = if config_path.exists() {
        RunConfig::from_path(&config_path)?
    } else {
        RunConfig::default()
    };
    config.update_with_cli(cli);
    config.validate()?;

    Ok(config)
}
