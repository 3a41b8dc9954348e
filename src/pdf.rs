//! PDF orchestration.
//!
//! Runs strictly after the web writer barrier: verifies the external
//! renderer, builds its argument list from the same column traversal the
//! web TOC used, and drives it as a child process. A missing renderer is
//! fatal; an unexpected version or a non-zero exit is a warning only.

use crate::config::RunConfig;
use crate::log;
use crate::metadata::Parameters;
use crate::nav::{SortedPages, output_rel_path};
use crate::output::{TEMP_COVER, TEMP_FOOTER, TEMP_HEADER, TEMP_TOC_XSL};
use crate::utils::command;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// The renderer version this pipeline is tested against. Other versions
/// mostly work; the mismatch is reported and the run continues.
const EXPECTED_RENDERER_VERSION: &str = "0.12.6";

/// Generate the paginated PDF.
///
/// Preconditions: the web tree and the transient cover/header/footer
/// files are already on disk, and `sorted` is the same navigation
/// structure the web TOC was rendered from.
pub fn generate(
    config: &RunConfig,
    parameters: &Parameters,
    sorted: &SortedPages<'_>,
) -> Result<()> {
    let renderer = resolve_renderer(config)?;
    check_version(&renderer)?;

    let args = build_args(config, parameters, sorted);
    run_renderer(config, &renderer, &args, &parameters.pdf_filename());
    Ok(())
}

/// Resolve the renderer executable. Not finding it is fatal: the
/// version check cannot even be attempted.
fn resolve_renderer(config: &RunConfig) -> Result<PathBuf> {
    let path = config.renderer_path();
    which::which(&path).with_context(|| {
        format!(
            "PDF renderer `{}` not found. Install it or point [pdf.renderer] at the executable.",
            path.display()
        )
    })
}

/// Run the renderer's version report and compare against the pinned
/// known-good version. A mismatch is a warning, not an error.
fn check_version(renderer: &Path) -> Result<()> {
    let output = crate::exec!(renderer; "--version")
        .context("PDF renderer version check failed to execute")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_version(&stdout) {
        Some(found) if found == EXPECTED_RENDERER_VERSION => {}
        Some(found) => {
            log!("warn"; "renderer version {found} differs from expected {EXPECTED_RENDERER_VERSION}, proceeding anyway");
        }
        None => {
            log!("warn"; "could not parse renderer version from `{}`", stdout.trim());
        }
    }
    Ok(())
}

/// Extract the version token from `wkhtmltopdf 0.12.6 (with patched qt)`.
fn parse_version(stdout: &str) -> Option<&str> {
    stdout.split_whitespace().nth(1)
}

/// Build the renderer's argument list as discrete tokens.
///
/// The page paths appear in the exact column-major order produced by the
/// navigation builder, so the PDF table of contents matches the web one.
/// The final token is the destination path.
fn build_args(
    config: &RunConfig,
    parameters: &Parameters,
    sorted: &SortedPages<'_>,
) -> Vec<OsString> {
    let output = &config.build.output;
    let temp = config.temp_dir();

    let mut args: Vec<OsString> = [
        "--zoom",
        "1.3",
        "--image-quality",
        "100",
        "--print-media-type",
        "--orientation",
        "Portrait",
        "--page-size",
        "A4",
        "-T",
        "25",
        "-B",
        "25",
        "-L",
        "20",
        "-R",
        "20",
        "--header-spacing",
        "5",
        "--footer-spacing",
        "5",
        "--no-stop-slow-scripts",
        "--javascript-delay",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    // The delay lets client-side rendering finish before rasterization;
    // --no-stop-slow-scripts alone does not wait for it.
    args.push(config.pdf.javascript_delay.to_string().into());

    args.push("--user-style-sheet".into());
    args.push(output.join("require/pdf.css").into());
    args.push("--header-html".into());
    args.push(temp.join(TEMP_HEADER).into());
    args.push("--footer-html".into());
    args.push(temp.join(TEMP_FOOTER).into());

    args.push("cover".into());
    args.push(temp.join(TEMP_COVER).into());

    args.push("toc".into());
    args.push("--xsl-style-sheet".into());
    args.push(temp.join(TEMP_TOC_XSL).into());

    for page in sorted.ordered_pages() {
        args.push(output.join(output_rel_path(&page.source)).into());
    }

    args.push(output.join(parameters.pdf_filename()).into());
    args
}

/// Spawn the renderer and classify the outcome.
///
/// The renderer reports progress on stderr; with verbose diagnostics it
/// is passed through live, otherwise suppressed behind a single status
/// line. Neither a non-zero exit nor a launch failure at this point
/// halts the run.
fn run_renderer(config: &RunConfig, renderer: &Path, args: &[OsString], pdf_name: &str) {
    let cmd = command::to_cmd_vec(renderer);
    let (name, mut child) = match command::prepare(None, &cmd, args) {
        Ok(prepared) => prepared,
        Err(e) => {
            log!("warn"; "failed to prepare renderer invocation: {e:#}");
            return;
        }
    };

    child.stdout(Stdio::null());
    if config.verbose {
        child.stderr(Stdio::inherit());
    } else {
        child.stderr(Stdio::null());
        log!("pdf"; "rendering {pdf_name} (this can take a while)...");
    }

    match child.status() {
        Ok(status) if status.success() => {
            log!("pdf"; "wrote {pdf_name}");
        }
        Ok(status) => {
            log!("warn"; "renderer `{name}` exited with {status}; the PDF may be incomplete");
        }
        Err(e) => {
            log!("warn"; "failed to launch renderer `{name}`: {e}");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
