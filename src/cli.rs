//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docweave documentation site assembler CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Input root containing parameters.json, contents.json and sources
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output root (fully replaced on each build)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file name, resolved against the input root
    #[arg(short = 'C', long, default_value = "docweave.toml")]
    pub config: PathBuf,

    /// Pass external renderer diagnostics through live
    #[arg(short, long)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Build arguments for the Build command
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Generate the paginated PDF after the web tree is written
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub pdf: Option<bool>,

    /// External renderer executable (name on PATH or explicit path)
    #[arg(long)]
    pub renderer: Option<String>,

    /// Milliseconds to wait for client-side scripts before rasterizing
    #[arg(long = "javascript-delay")]
    pub javascript_delay: Option<u32>,

    /// Override the release version taken from parameters.json
    #[arg(long = "release-version")]
    pub release_version: Option<String>,

    /// Override the release date taken from parameters.json
    #[arg(long = "release-date")]
    pub release_date: Option<String>,

    /// Write a redirect stub one directory above the output root
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub redirect: Option<bool>,

    /// Prepend a per-page table of contents to rendered Markdown pages
    #[arg(long = "inpage-toc", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub inpage_toc: Option<bool>,

    /// Render math with a locally copied KaTeX bundle
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub katex: Option<bool>,

    /// Render math with the MathJax CDN
    #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub mathjax: Option<bool>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Deletes the output root if there is one and assembles the site
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Validate parameters.json and contents.json, then exit
    Check,
}

#[allow(unused)]
impl Cli {
    pub const fn is_build(&self) -> bool {
        matches!(self.command, Commands::Build { .. })
    }
    pub const fn is_check(&self) -> bool {
        matches!(self.command, Commands::Check)
    }
}
