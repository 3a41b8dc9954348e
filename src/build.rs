//! Pipeline orchestration.
//!
//! Runs the assembly stages in order, each gated on the previous one
//! succeeding:
//!
//! ```text
//! run()
//!     │
//!     ├── metadata::load()        validate parameters.json + contents.json
//!     ├── reset_output_root()     output dir fully owned by this run
//!     ├── content::load_all()     parallel read + render (barrier)
//!     ├── nav / compose           navigation + template composition
//!     ├── output::write_site()    parallel writes + assets (barrier)
//!     ├── pdf::generate()         optional, strictly after the writes
//!     └── finalize()              redirect stub + temp cleanup
//! ```
//!
//! Fatal errors propagate immediately; files already written stay on
//! disk. Warnings (renderer version, redirect write) never stop the run.

use crate::compose::{self, REDIRECT_TEMPLATE};
use crate::config::RunConfig;
use crate::content;
use crate::log;
use crate::logger::ProgressBars;
use crate::metadata::{self, SiteMeta};
use crate::nav::{self, SortedPages};
use crate::output;
use crate::pdf;
use crate::utils::fsx;
use crate::utils::html::{Slots, escape_text, fill_slots};
use anyhow::{Context, Result};
use std::fs;

/// Assemble the whole site.
pub fn run(config: &'static RunConfig) -> Result<()> {
    // Metadata is validated before the output root is touched, so
    // invalid input never destroys a previous build.
    log!("metadata"; "validating...");
    let meta = metadata::load(config)?;
    let page_count = meta.contents.all_pages().count();
    log!("metadata"; "{} pages in {} sections", page_count, meta.contents.sections.len());

    reset_output_root(config)?;

    log!("content"; "rendering sources...");
    let progress = ProgressBars::new(&[("content", page_count)]);
    let rendered = content::load_all(config, &meta.contents, || {
        progress.inc_by_name("content");
    })?;
    progress.finish();

    let sorted = SortedPages::build(&meta.contents);
    let toc = nav::render_toc(&sorted, &meta.parameters, config.pdf.enable)?;

    log!("compose"; "composing pages...");
    let site = compose::compose_site(config, &meta, &toc, &rendered)?;

    let write_count = site.pages.len() + 1 + if site.pdf.is_some() { 4 } else { 0 };
    let progress = ProgressBars::new(&[("write", write_count)]);
    output::write_site(config, &site, || {
        progress.inc_by_name("write");
    })?;
    progress.finish();
    output::log_write_result(config, &meta.parameters)?;

    if config.pdf.enable {
        pdf::generate(config, &meta.parameters, &sorted)?;
    }

    finalize(config, &meta);

    log!("build"; "done");
    Ok(())
}

/// Validate the metadata documents and exit.
pub fn check(config: &RunConfig) -> Result<()> {
    let meta = metadata::load(config)?;
    log!("check"; "parameters and contents are valid ({} pages)",
        meta.contents.all_pages().count());
    Ok(())
}

/// Delete and recreate the output root, eliminating stale files.
fn reset_output_root(config: &RunConfig) -> Result<()> {
    let output = &config.build.output;
    fsx::remove_dir_if_exists(output)
        .with_context(|| format!("Failed to clear output directory: {}", output.display()))?;
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;
    Ok(())
}

/// Always runs at the end of a successful pipeline, including after PDF
/// warnings. Everything in here is non-fatal.
fn finalize(config: &RunConfig, meta: &SiteMeta) {
    if config.build.redirect {
        write_redirect(config, meta);
    }

    if config.pdf.enable {
        if let Err(e) = fsx::remove_dir_if_exists(&config.temp_dir()) {
            log!("warn"; "failed to remove temp directory: {e:#}");
        }
    }
}

/// Write the redirect stub one directory above the output root.
///
/// The target is composed from the output root's own directory name so
/// the stub keeps working when the whole parent tree is relocated. A
/// failed write is reported and ignored.
fn write_redirect(config: &RunConfig, meta: &SiteMeta) {
    let output = &config.build.output;
    let (Some(parent), Some(dirname)) = (output.parent(), output.file_name()) else {
        log!("warn"; "output root has no parent directory, skipping redirect");
        return;
    };

    let home = nav::output_rel_path(&meta.contents.home_page().source);
    let target = format!("{}/{}", dirname.to_string_lossy(), home);

    let mut slots = Slots::default();
    slots.content.insert("dg-redirectLink", escape_text(&target));
    slots.attrs.insert("dg-redirectLink", ("href", target.clone()));
    slots
        .attrs
        .insert("dg-redirectMeta", ("content", format!("0; url={target}")));

    let result = fill_slots(REDIRECT_TEMPLATE, &slots)
        .and_then(|html| fsx::write_with_parents(&parent.join("index.html"), &html));

    match result {
        Ok(()) => log!("redirect"; "wrote {}/index.html -> {target}", parent.display()),
        Err(e) => log!("warn"; "failed to write redirect: {e:#}"),
    }
}

// ============================================================================
// Tests
// ============================================================================
