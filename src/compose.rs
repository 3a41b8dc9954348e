//! Template composition.
//!
//! Holds the embedded template set, performs the one-time global
//! parameter injection, and produces one composed document per page by
//! cloning the injected main shell and filling its content slot. The
//! PDF cover/header/footer are singletons: injected in place exactly
//! once, never cloned.

use crate::config::RunConfig;
use crate::content::RenderedPages;
use crate::log;
use crate::metadata::{LinkField, PageEntry, Parameters, SiteMeta};
use crate::nav;
use crate::utils::html::{Heading, Slots, escape_text, fill_slots, link_or_text, transform_content};
use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Local};

// ============================================================================
// Template Set
// ============================================================================

pub const MAIN_TEMPLATE: &str = include_str!("../assets/templates/main.html");
pub const OWNERSHIP_TEMPLATE: &str = include_str!("../assets/templates/ownership.html");
pub const REDIRECT_TEMPLATE: &str = include_str!("../assets/templates/redirect.html");
pub const PDF_COVER_TEMPLATE: &str = include_str!("../assets/templates/pdf-cover.html");
pub const PDF_HEADER_TEMPLATE: &str = include_str!("../assets/templates/pdf-header.html");
pub const PDF_FOOTER_TEMPLATE: &str = include_str!("../assets/templates/pdf-footer.html");
pub const PDF_TOC_XSL: &str = include_str!("../assets/templates/toc.xsl");

/// Logo probed below the input root; absence is non-fatal.
const LOGO_REL_PATH: &str = "files/images/logo.png";
const LOGO_HEIGHT_PX: u32 = 40;
const FALLBACK_HEADER_PADDING_PX: u32 = 38;

const MATHJAX_CDN: &str = "https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js";

// ============================================================================
// Composed Output
// ============================================================================

/// One page ready for serialization, keyed by its derived output path.
#[derive(Debug)]
pub struct ComposedPage {
    pub rel_path: String,
    pub html: String,
}

/// The PDF cover/header/footer documents, present only when PDF output
/// was requested.
#[derive(Debug)]
pub struct PdfAuxiliary {
    pub cover: String,
    pub header: String,
    pub footer: String,
}

/// Everything the writer stage needs.
#[derive(Debug)]
pub struct ComposedSite {
    pub pages: Vec<ComposedPage>,
    pub ownership: String,
    pub pdf: Option<PdfAuxiliary>,
}

// ============================================================================
// Public API
// ============================================================================

/// Compose every output document.
///
/// Global parameters are injected once into each template; the injected
/// main shell is then cloned per page so no two pages' mutations
/// interfere.
pub fn compose_site(
    config: &RunConfig,
    meta: &SiteMeta,
    toc_html: &str,
    rendered: &RenderedPages,
) -> Result<ComposedSite> {
    let slots = global_slots(config, meta, toc_html);

    let main = fill_slots(MAIN_TEMPLATE, &slots).context("Failed to inject main template")?;
    let ownership_body =
        fill_slots(OWNERSHIP_TEMPLATE, &slots).context("Failed to inject ownership template")?;

    let mut pages = Vec::new();
    for page in meta.contents.all_pages() {
        let fragment = rendered
            .get(&page.source)
            .ok_or_else(|| anyhow!("No rendered content for source `{}`", page.source))?;
        let html = compose_page(config, &main, page, fragment)
            .with_context(|| format!("Failed to compose `{}`", page.source))?;
        pages.push(ComposedPage {
            rel_path: nav::output_rel_path(&page.source),
            html,
        });
    }

    let ownership = {
        let mut content = Slots::default();
        content.content.insert(
            "dg-content",
            format!("<div class=\"dg-container\">{ownership_body}</div>"),
        );
        fill_slots(&main, &content).context("Failed to compose ownership page")?
    };

    let pdf = if config.pdf.enable {
        Some(PdfAuxiliary {
            cover: fill_slots(PDF_COVER_TEMPLATE, &slots)
                .context("Failed to inject PDF cover template")?,
            header: fill_slots(PDF_HEADER_TEMPLATE, &slots)
                .context("Failed to inject PDF header template")?,
            footer: fill_slots(PDF_FOOTER_TEMPLATE, &slots)
                .context("Failed to inject PDF footer template")?,
        })
    } else {
        None
    };

    Ok(ComposedSite {
        pages,
        ownership,
        pdf,
    })
}

// ============================================================================
// Per-Page Composition
// ============================================================================

/// Clone the injected main shell and fill its content slot for one page.
fn compose_page(
    config: &RunConfig,
    main: &str,
    page: &PageEntry,
    fragment: &str,
) -> Result<String> {
    let (body, headings) = transform_content(fragment)?;

    let mut content = String::with_capacity(body.len() + 256);
    // Synthetic top-level heading: keeps the PDF outline aligned with
    // the declared page titles. Hidden on raw HTML pages.
    if page.html {
        content.push_str(&format!(
            "<h1 id=\"dg-autoTitle\" class=\"dg-hidden\">{}</h1>",
            escape_text(&page.title)
        ));
    } else {
        content.push_str(&format!(
            "<h1 id=\"dg-autoTitle\">{}</h1>",
            escape_text(&page.title)
        ));
    }

    if config.build.inpage_toc && !page.html && !headings.is_empty() {
        content.push_str(&inpage_toc_list(&headings));
    }
    content.push_str(&body);

    let wrapper = if page.html {
        "dg-unconfined"
    } else {
        "dg-container"
    };

    let mut slots = Slots::default();
    slots
        .content
        .insert("dg-content", format!("<div class=\"{wrapper}\">{content}</div>"));
    fill_slots(main, &slots)
}

/// The in-page contents list, one entry per collected heading.
fn inpage_toc_list(headings: &[Heading]) -> String {
    let mut list = String::from("<ul class=\"dg-inpage-toc\">");
    for heading in headings {
        list.push_str(&format!(
            "<li class=\"dg-level-{}\"><a href=\"#{}\">{}</a></li>",
            heading.level,
            escape_text(&heading.anchor),
            escape_text(&heading.text)
        ));
    }
    list.push_str("</ul>");
    list
}

// ============================================================================
// Global Injection
// ============================================================================

/// Build the slot set applied once to every loaded template.
fn global_slots<'a>(config: &RunConfig, meta: &SiteMeta, toc_html: &str) -> Slots<'a> {
    let params = &meta.parameters;
    let mut slots = Slots::default();

    let text_fields: [(&str, &str); 6] = [
        ("dg-title", &params.title),
        ("dg-marking", &params.marking),
        ("dg-module", &params.module),
        ("dg-id", &params.id),
        ("dg-summary", &params.summary),
        ("dg-legalese", &params.legalese),
    ];
    for (id, value) in text_fields {
        slots.content.insert(id, escape_text(value));
    }

    let link_fields: [(&str, &LinkField); 5] = [
        ("dg-owner", &params.owner),
        ("dg-author", &params.author),
        ("dg-organization", &params.organization),
        ("dg-website", &params.website),
        ("dg-backlink", &params.backlink),
    ];
    for (id, field) in link_fields {
        slots.content.insert(id, link_or_text(&field.text, &field.url));
    }

    slots
        .content
        .insert("dg-contributors", contributors_line(&params.contributors));
    slots
        .content
        .insert("dg-version", escape_text(release_version(config, params)));
    slots
        .content
        .insert("dg-date", escape_text(release_date(config, params)));

    let now = Local::now();
    slots.content.insert(
        "dg-copyright",
        format!("© {} {}", now.year(), escape_text(&params.organization.text)),
    );
    slots.content.insert(
        "dg-generated",
        format!(
            "Generated by docweave {} on {}",
            env!("CARGO_PKG_VERSION"),
            now.format("%Y-%m-%d %H:%M:%S")
        ),
    );

    slots.content.insert("dg-nav", toc_html.to_owned());

    let home = nav::output_rel_path(&meta.contents.home_page().source);
    slots.content.insert("dg-homeLink", escape_text(&params.name));
    slots.attrs.insert("dg-homeLink", ("href", home));

    slots.head_extra = format!("{}{}", logo_style(config), math_refs(config));
    slots
}

/// Release version: external override wins over parameters.json.
fn release_version<'a>(config: &'a RunConfig, params: &'a Parameters) -> &'a str {
    config.build.version.as_deref().unwrap_or(&params.version)
}

/// Release date: external override wins over parameters.json.
fn release_date<'a>(config: &'a RunConfig, params: &'a Parameters) -> &'a str {
    config
        .build
        .release_date
        .as_deref()
        .unwrap_or(&params.date)
}

/// Comma-joined contributor list, each entry a link or plain text.
fn contributors_line(contributors: &[LinkField]) -> String {
    contributors
        .iter()
        .map(|c| link_or_text(&c.text, &c.url))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Header sizing derived from the logo image.
///
/// A missing or unreadable logo is non-fatal: the header falls back to a
/// fixed left padding.
fn logo_style(config: &RunConfig) -> String {
    let logo = config.build.input.join(LOGO_REL_PATH);
    match image::image_dimensions(&logo) {
        Ok((width, height)) if height > 0 => {
            let scaled = width * LOGO_HEIGHT_PX / height;
            format!(
                "<style>.dg-logo{{background-image:url(\"{LOGO_REL_PATH}\");width:{scaled}px;height:{LOGO_HEIGHT_PX}px}}</style>"
            )
        }
        _ => {
            log!("warn"; "logo not found at {}, using fixed header padding", logo.display());
            format!("<style>.dg-header{{padding-left:{FALLBACK_HEADER_PADDING_PX}px}}</style>")
        }
    }
}

/// Math engine references for the page head. The engines are mutually
/// exclusive (enforced by config validation): KaTeX uses the locally
/// copied bundle, MathJax the public CDN.
fn math_refs(config: &RunConfig) -> String {
    if config.math.katex {
        concat!(
            "<link rel=\"stylesheet\" href=\"require/katex/katex.min.css\"/>",
            "<script defer=\"defer\" src=\"require/katex/katex.min.js\"> </script>",
            "<script defer=\"defer\" src=\"require/katex/contrib/auto-render.min.js\" ",
            "onload=\"renderMathInElement(document.body);\"> </script>"
        )
        .to_owned()
    } else if config.math.mathjax {
        format!("<script async=\"async\" src=\"{MATHJAX_CDN}\"> </script>")
    } else {
        String::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
