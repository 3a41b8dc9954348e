//! Source document loading and rendering.
//!
//! Reads every declared source concurrently and renders each into an HTML
//! fragment keyed by its source identifier. The stage is a barrier: it
//! completes only when every read has finished, and fails as soon as any
//! one fails.

use crate::config::RunConfig;
use crate::log;
use crate::metadata::{Contents, PageEntry};
use anyhow::{Context, Result, anyhow};
use pulldown_cmark::{Options, Parser, html as md_html};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};

/// Rendered fragments keyed by source identifier.
pub type RenderedPages = HashMap<String, String>;

/// Read and render every declared source document in parallel.
///
/// Descriptors with the `html` flag pass through verbatim; everything
/// else is rendered as Markdown. Any unreadable source is fatal to the
/// whole run; remaining in-flight work is discarded.
pub fn load_all(
    config: &RunConfig,
    contents: &Contents,
    on_progress: impl Fn() + Sync,
) -> Result<RenderedPages> {
    let descriptors: Vec<&PageEntry> = contents.all_pages().collect();
    let has_error = AtomicBool::new(false);

    let results: Vec<Result<(String, String)>> = descriptors
        .par_iter()
        .map(|page| {
            if has_error.load(Ordering::Relaxed) {
                return Err(anyhow!("Aborted"));
            }
            match load_page(config, page) {
                Ok(html) => {
                    on_progress();
                    Ok((page.source.clone(), html))
                }
                Err(e) => {
                    if !has_error.swap(true, Ordering::Relaxed) {
                        log!("error"; "{}: {:#}", page.source, e);
                    }
                    Err(anyhow!("Content loading failed"))
                }
            }
        })
        .collect();

    let mut rendered = RenderedPages::with_capacity(results.len());
    for result in results {
        let (source, html) = result?;
        rendered.insert(source, html);
    }

    Ok(rendered)
}

/// Read one source document and render it to an HTML fragment.
fn load_page(config: &RunConfig, page: &PageEntry) -> Result<String> {
    let path = config.build.input.join(&page.source);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read source: {}", path.display()))?;
    let text = strip_bom(&raw);

    if page.html {
        Ok(text.to_owned())
    } else {
        Ok(render_markdown(text))
    }
}

/// Strip a leading UTF-8 byte-order-mark.
fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Render Markdown to an HTML fragment.
///
/// Tables are enabled; link destinations are passed through untouched,
/// so local-file and other non-http schemes survive rendering.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(text, options);
    let mut html = String::with_capacity(text.len() * 2);
    md_html::push_html(&mut html, parser);
    html
}

// ============================================================================
// Tests
// ============================================================================
