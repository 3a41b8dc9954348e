//! Web output writing and asset distribution.
//!
//! Serializes every composed document under the output root in one
//! parallel fan-out (the stage is a barrier: all writes succeed or the
//! run fails), then distributes the embedded framework assets and the
//! user-supplied files tree.

use crate::compose::{ComposedSite, PDF_TOC_XSL};
use crate::config::RunConfig;
use crate::log;
use crate::metadata::Parameters;
use crate::nav::OWNERSHIP_PAGE;
use crate::utils::fsx::{copy_dir_recursively, write_with_parents};
use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

// ============================================================================
// Embedded framework assets
// ============================================================================

/// Shared web assets written into `<output>/require/`.
const REQUIRE_ASSETS: &[(&str, &str)] = &[
    ("docweave.css", include_str!("../assets/require/docweave.css")),
    ("docweave.js", include_str!("../assets/require/docweave.js")),
    ("pdf.css", include_str!("../assets/require/pdf.css")),
];

/// Transient file names consumed by the PDF orchestrator.
pub const TEMP_COVER: &str = "pdf-cover.html";
pub const TEMP_HEADER: &str = "pdf-header.html";
pub const TEMP_FOOTER: &str = "pdf-footer.html";
pub const TEMP_TOC_XSL: &str = "toc.xsl";

// ============================================================================
// Public API
// ============================================================================

/// Write every composed document and distribute assets.
///
/// Page writes (plus the ownership page and, when requested, the PDF
/// temp files) run concurrently; any failed write is fatal. Asset copy
/// failures are fatal as well.
pub fn write_site(
    config: &RunConfig,
    site: &ComposedSite,
    on_progress: impl Fn() + Sync,
) -> Result<()> {
    let output = &config.build.output;
    let temp = config.temp_dir();

    let mut writes: Vec<(PathBuf, &str)> = site
        .pages
        .iter()
        .map(|page| (output.join(&page.rel_path), page.html.as_str()))
        .collect();
    writes.push((output.join(OWNERSHIP_PAGE), site.ownership.as_str()));

    if let Some(pdf) = &site.pdf {
        writes.push((temp.join(TEMP_COVER), pdf.cover.as_str()));
        writes.push((temp.join(TEMP_HEADER), pdf.header.as_str()));
        writes.push((temp.join(TEMP_FOOTER), pdf.footer.as_str()));
        writes.push((temp.join(TEMP_TOC_XSL), PDF_TOC_XSL));
    }

    let has_error = AtomicBool::new(false);
    writes.par_iter().try_for_each(|(path, contents)| {
        if has_error.load(Ordering::Relaxed) {
            return Err(anyhow!("Aborted"));
        }
        if let Err(e) = write_with_parents(path, contents) {
            if !has_error.swap(true, Ordering::Relaxed) {
                log!("error"; "{}: {:#}", path.display(), e);
            }
            return Err(anyhow!("Output writing failed"));
        }
        on_progress();
        Ok(())
    })?;

    distribute_assets(config)
}

/// Copy the embedded `require/` assets, the user `files/` tree and,
/// when KaTeX is selected, its asset bundle.
fn distribute_assets(config: &RunConfig) -> Result<()> {
    let require = config.build.output.join("require");

    for (name, contents) in REQUIRE_ASSETS {
        write_with_parents(&require.join(name), contents)
            .with_context(|| format!("Failed to write framework asset `{name}`"))?;
    }

    let files = config.build.input.join("files");
    if files.is_dir() {
        copy_dir_recursively(&files, &config.build.output.join("files"))
            .context("Failed to copy attached files tree")?;
    }

    if config.math.katex {
        copy_dir_recursively(&config.math.katex_assets, &require.join("katex"))
            .context("Failed to copy KaTeX assets")?;
    }

    Ok(())
}

/// Log the write result based on output directory contents.
pub fn log_write_result(config: &RunConfig, parameters: &Parameters) -> Result<()> {
    let file_count = fs::read_dir(&config.build.output)?
        .filter_map(Result::ok)
        .count();

    log!("write"; "{} entries under {} for {}",
        file_count,
        config.build.output.display(),
        parameters.name
    );
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{ComposedPage, PdfAuxiliary};
    use tempfile::TempDir;

    fn site(with_pdf: bool) -> ComposedSite {
        ComposedSite {
            pages: vec![
                ComposedPage {
                    rel_path: "intro.html".to_owned(),
                    html: "<html>intro</html>".to_owned(),
                },
                ComposedPage {
                    rel_path: "guide/setup.html".to_owned(),
                    html: "<html>setup</html>".to_owned(),
                },
            ],
            ownership: "<html>own</html>".to_owned(),
            pdf: with_pdf.then(|| PdfAuxiliary {
                cover: "<html>cover</html>".to_owned(),
                header: "<html>header</html>".to_owned(),
                footer: "<html>footer</html>".to_owned(),
            }),
        }
    }

    fn config_for(input: &TempDir, output: &TempDir) -> RunConfig {
        let mut config = RunConfig::default();
        config.build.input = input.path().to_path_buf();
        config.build.output = output.path().join("out");
        config
    }

    #[test]
    fn test_write_site_writes_every_page() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = config_for(&input, &output);

        write_site(&config, &site(false), || {}).unwrap();

        let out = &config.build.output;
        assert!(out.join("intro.html").is_file());
        assert!(out.join("guide/setup.html").is_file());
        assert!(out.join("ownership.html").is_file());
        assert!(out.join("require/docweave.css").is_file());
        assert!(out.join("require/docweave.js").is_file());
    }

    #[test]
    fn test_write_site_no_temp_without_pdf() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = config_for(&input, &output);

        write_site(&config, &site(false), || {}).unwrap();
        assert!(!config.temp_dir().exists());
    }

    #[test]
    fn test_write_site_temp_files_with_pdf() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = config_for(&input, &output);

        write_site(&config, &site(true), || {}).unwrap();

        let temp = config.temp_dir();
        assert!(temp.join(TEMP_COVER).is_file());
        assert!(temp.join(TEMP_HEADER).is_file());
        assert!(temp.join(TEMP_FOOTER).is_file());
        assert!(temp.join(TEMP_TOC_XSL).is_file());
    }

    #[test]
    fn test_write_site_copies_files_tree() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::create_dir_all(input.path().join("files/images")).unwrap();
        fs::write(input.path().join("files/images/logo.png"), b"png").unwrap();

        let config = config_for(&input, &output);
        write_site(&config, &site(false), || {}).unwrap();

        assert!(config
            .build
            .output
            .join("files/images/logo.png")
            .is_file());
    }

    #[test]
    fn test_write_site_missing_katex_bundle_fatal() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let mut config = config_for(&input, &output);
        config.math.katex = true;
        config.math.katex_assets = input.path().join("katex-not-there");

        assert!(write_site(&config, &site(false), || {}).is_err());
    }

    #[test]
    fn test_write_site_katex_bundle_copied() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::create_dir_all(input.path().join("katex")).unwrap();
        fs::write(input.path().join("katex/katex.min.css"), "x").unwrap();

        let mut config = config_for(&input, &output);
        config.math.katex = true;
        config.math.katex_assets = input.path().join("katex");

        write_site(&config, &site(false), || {}).unwrap();
        assert!(config
            .build
            .output
            .join("require/katex/katex.min.css")
            .is_file());
    }

    #[test]
    fn test_progress_callback_counts_writes() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let config = config_for(&input, &output);

        let counter = std::sync::atomic::AtomicUsize::new(0);
        write_site(&config, &site(false), || {
            counter.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        // 2 pages + ownership
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }
}
