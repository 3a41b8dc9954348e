//! Run configuration management for `docweave.toml`.
//!
//! # Sections
//!
//! | Section   | Purpose                                          |
//! |-----------|--------------------------------------------------|
//! | `[build]` | Input/output roots, redirect, in-page TOC        |
//! | `[pdf]`   | PDF generation (renderer, script delay)          |
//! | `[math]`  | Math rendering engine selection                  |
//!
//! # Example
//!
//! ```toml
//! [build]
//! input = "."
//! output = "public/html"
//! redirect = true
//!
//! [pdf]
//! enable = true
//! javascript_delay = 2500
//!
//! [math]
//! katex = true
//! ```

pub mod defaults;
mod error;

pub use error::ConfigError;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing docweave.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Pass the external renderer's diagnostic stream through live
    #[serde(skip)]
    pub verbose: bool,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// PDF generation settings
    #[serde(default)]
    pub pdf: PdfConfig,

    /// Math rendering settings
    #[serde(default)]
    pub math: MathConfig,
}

/// `[build]` section - input/output roots and page options.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Source root containing parameters.json, contents.json and sources.
    #[serde(default = "defaults::build::input")]
    #[educe(Default = defaults::build::input())]
    pub input: PathBuf,

    /// Destination root, fully replaced on every run.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Write a redirect stub one directory above the output root.
    #[serde(default)]
    pub redirect: bool,

    /// Prepend a per-page table of contents to rendered Markdown pages.
    #[serde(default)]
    pub inpage_toc: bool,

    /// Release version override; falls back to parameters.json.
    #[serde(default)]
    pub version: Option<String>,

    /// Release date override; falls back to parameters.json.
    #[serde(default)]
    pub release_date: Option<String>,
}

/// `[pdf]` section - external renderer orchestration.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct PdfConfig {
    /// Generate the paginated PDF after the web tree is written.
    #[serde(default)]
    pub enable: bool,

    /// Renderer executable (name resolved on PATH, or explicit path).
    #[serde(default = "defaults::pdf::renderer")]
    #[educe(Default = defaults::pdf::renderer())]
    pub renderer: String,

    /// Delay in milliseconds before rasterization, letting client-side
    /// rendering finish. The renderer's own don't-stop-slow-scripts flag
    /// is not sufficient for this.
    #[serde(default = "defaults::pdf::javascript_delay")]
    #[educe(Default = defaults::pdf::javascript_delay())]
    pub javascript_delay: u32,
}

/// `[math]` section - math rendering engine selection.
///
/// The two engines are mutually exclusive: katex copies a local asset
/// bundle into the output, mathjax references the public CDN.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct MathConfig {
    #[serde(default)]
    pub katex: bool,

    #[serde(default)]
    pub mathjax: bool,

    /// Location of the KaTeX distribution to copy (relative to the input
    /// root unless absolute).
    #[serde(default = "defaults::math::katex_assets")]
    #[educe(Default = defaults::math::katex_assets())]
    pub katex_assets: PathBuf,
}

impl RunConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Get CLI arguments reference
    pub fn get_cli(&self) -> &'static Cli {
        self.cli.unwrap()
    }

    /// Transient directory holding the PDF cover/header/footer files.
    pub fn temp_dir(&self) -> PathBuf {
        self.build.output.join("temp")
    }

    /// Renderer executable with tilde expansion applied.
    pub fn renderer_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.pdf.renderer).into_owned())
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);
        self.verbose = cli.verbose;

        Self::update_option(&mut self.build.input, cli.input.as_ref());
        Self::update_option(&mut self.build.output, cli.output.as_ref());

        if let Commands::Build { build_args } = &cli.command {
            Self::update_option(&mut self.pdf.enable, build_args.pdf.as_ref());
            Self::update_option(&mut self.pdf.renderer, build_args.renderer.as_ref());
            Self::update_option(
                &mut self.pdf.javascript_delay,
                build_args.javascript_delay.as_ref(),
            );
            Self::update_option(&mut self.build.redirect, build_args.redirect.as_ref());
            Self::update_option(&mut self.build.inpage_toc, build_args.inpage_toc.as_ref());
            Self::update_option(&mut self.math.katex, build_args.katex.as_ref());
            Self::update_option(&mut self.math.mathjax, build_args.mathjax.as_ref());
            if build_args.release_version.is_some() {
                self.build.version = build_args.release_version.clone();
            }
            if build_args.release_date.is_some() {
                self.build.release_date = build_args.release_date.clone();
            }
        }

        self.update_paths();
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Normalize all paths: the input root against the working directory,
    /// everything else against the input root.
    fn update_paths(&mut self) {
        let cli = self.get_cli();

        self.build.input = Self::normalize_path(&self.build.input);
        self.config_path = Self::normalize_path(&self.build.input.join(&cli.config));

        if self.build.output.is_relative() {
            self.build.output = self.build.input.join(&self.build.output);
        }
        self.build.output = Self::normalize_path(&self.build.output);

        if self.math.katex_assets.is_relative() {
            self.math.katex_assets = self.build.input.join(&self.math.katex_assets);
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the current command
    pub fn validate(&self) -> Result<()> {
        if !self.build.input.exists() {
            bail!(ConfigError::Validation(format!(
                "[build.input] not found: {}",
                self.build.input.display()
            )));
        }

        if self.math.katex && self.math.mathjax {
            bail!(ConfigError::Validation(
                "[math] katex and mathjax are mutually exclusive".into()
            ));
        }

        if self.pdf.enable {
            if self.pdf.renderer.trim().is_empty() {
                bail!(ConfigError::Validation(
                    "[pdf.renderer] must not be empty".into()
                ));
            }
            if self.pdf.javascript_delay == 0 {
                bail!(ConfigError::Validation(
                    "[pdf.javascript_delay] must be greater than zero".into()
                ));
            }
        }

        if self.build.redirect && self.build.output.parent().is_none() {
            bail!(ConfigError::Validation(
                "[build.redirect] requires the output root to have a parent directory".into()
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
