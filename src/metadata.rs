//! Site metadata loading and validation.
//!
//! Deserializes `parameters.json` and `contents.json` into typed records
//! and validates them before any rendering work begins. Either payload
//! failing to parse or validate halts the run; no output is produced from
//! invalid input.

use crate::config::RunConfig;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Column reserved for the system-injected "Extra" section.
pub const EXTRA_COLUMN: u8 = 5;

/// Source identifier of the release notes page, always present.
pub const RELEASE_NOTES_SOURCE: &str = "release-notes.txt";

/// A name that renders as a link when `url` is non-empty, plain text
/// otherwise.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LinkField {
    pub text: String,
    #[serde(default)]
    pub url: String,
}

/// The `parameters.json` record: site-wide fields injected into every
/// template.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameters {
    pub title: String,
    /// Short site name; lowercased it names the PDF output file.
    pub name: String,
    pub version: String,
    pub date: String,
    pub organization: LinkField,
    pub author: LinkField,
    pub owner: LinkField,
    pub website: LinkField,
    pub backlink: LinkField,
    pub contributors: Vec<LinkField>,
    pub module: String,
    pub id: String,
    pub summary: String,
    pub marking: String,
    pub legalese: String,
}

impl Parameters {
    /// File name of the generated PDF: the lowercased site name.
    pub fn pdf_filename(&self) -> String {
        format!("{}.pdf", self.name.to_lowercase())
    }
}

/// One entry of a section: a page title plus the relative path of its
/// source document.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PageEntry {
    pub title: String,
    pub source: String,
    /// Pre-rendered HTML: used verbatim, bypassing Markdown rendering.
    #[serde(default)]
    pub html: bool,
}

/// A table-of-contents section: heading, column placement, pages.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub heading: String,
    pub column: u8,
    pub pages: Vec<PageEntry>,
}

/// The `contents.json` structure: an ordered list of sections.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Contents {
    pub sections: Vec<Section>,
}

impl Contents {
    /// Validate structural constraints the type system does not capture.
    pub fn validate(&self) -> Result<()> {
        if self.sections.is_empty() {
            bail!("contents.json must declare at least one section");
        }

        for section in &self.sections {
            if !(1..=EXTRA_COLUMN).contains(&section.column) {
                bail!(
                    "Section `{}`: column {} out of range (1-{})",
                    section.heading,
                    section.column,
                    EXTRA_COLUMN
                );
            }
            if section.pages.is_empty() {
                bail!("Section `{}` has no pages", section.heading);
            }
            for page in &section.pages {
                if page.source.trim().is_empty() {
                    bail!(
                        "Section `{}`: page `{}` has an empty source",
                        section.heading,
                        page.title
                    );
                }
            }
        }

        Ok(())
    }

    /// Append the synthetic "Extra" section carrying the release notes.
    ///
    /// Constructed in-process after validation; its shape matches the
    /// declared sections structurally.
    pub fn append_release_notes(&mut self) {
        self.sections.push(Section {
            heading: "Extra".to_owned(),
            column: EXTRA_COLUMN,
            pages: vec![PageEntry {
                title: "Release Notes".to_owned(),
                source: RELEASE_NOTES_SOURCE.to_owned(),
                html: false,
            }],
        });
    }

    /// All page descriptors in declaration order.
    pub fn all_pages(&self) -> impl Iterator<Item = &PageEntry> {
        self.sections.iter().flat_map(|s| s.pages.iter())
    }

    /// The home page: first page of the first declared section.
    pub fn home_page(&self) -> &PageEntry {
        &self.sections[0].pages[0]
    }
}

/// Validated metadata for one run.
#[derive(Debug, Clone)]
pub struct SiteMeta {
    pub parameters: Parameters,
    pub contents: Contents,
}

/// Load and validate both metadata documents, then append the synthetic
/// release notes section.
pub fn load(config: &RunConfig) -> Result<SiteMeta> {
    let parameters = load_json::<Parameters>(&config.build.input.join("parameters.json"))?;
    let mut contents = load_json::<Contents>(&config.build.input.join("contents.json"))?;

    contents.validate()?;
    contents.append_release_notes();

    Ok(SiteMeta {
        parameters,
        contents,
    })
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Schema validation failed for {}", path.display()))
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod tests {
    use super::*;
    use fixtures::PARAMS;

    fn contents_json() -> Contents {
        serde_json::from_str(
            r#"[
                { "heading": "Guide", "column": 1, "pages": [
                    { "title": "Intro", "source": "intro.md" },
                    { "title": "Raw", "source": "raw.html", "html": true }
                ]},
                { "heading": "Reference", "column": 2, "pages": [
                    { "title": "API", "source": "api.md" }
                ]}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parameters_deserialize() {
        let params: Parameters = serde_json::from_str(PARAMS).unwrap();
        assert_eq!(params.name, "Widget");
        assert_eq!(params.author.text, "Alice");
        assert_eq!(params.author.url, "");
        assert_eq!(params.contributors.len(), 2);
    }

    #[test]
    fn test_parameters_missing_required_field_fails() {
        // Drop "version"
        let broken = PARAMS.replace("\"version\": \"1.0\",", "");
        let result: Result<Parameters, _> = serde_json::from_str(&broken);
        assert!(result.is_err());
    }

    #[test]
    fn test_parameters_wrong_type_fails() {
        let broken = PARAMS.replace("\"version\": \"1.0\"", "\"version\": 1.0");
        let result: Result<Parameters, _> = serde_json::from_str(&broken);
        assert!(result.is_err());
    }

    #[test]
    fn test_link_field_url_defaults_empty() {
        let field: LinkField = serde_json::from_str(r#"{ "text": "Alice" }"#).unwrap();
        assert_eq!(field.url, "");
    }

    #[test]
    fn test_pdf_filename_lowercases() {
        let params: Parameters = serde_json::from_str(PARAMS).unwrap();
        assert_eq!(params.pdf_filename(), "widget.pdf");
    }

    #[test]
    fn test_contents_deserialize_and_validate() {
        let contents = contents_json();
        assert!(contents.validate().is_ok());
        assert_eq!(contents.sections.len(), 2);
        assert!(contents.sections[0].pages[1].html);
        assert!(!contents.sections[0].pages[0].html);
    }

    #[test]
    fn test_contents_column_out_of_range() {
        let contents: Contents = serde_json::from_str(
            r#"[{ "heading": "Bad", "column": 6, "pages": [
                { "title": "X", "source": "x.md" }
            ]}]"#,
        )
        .unwrap();
        let err = contents.validate().unwrap_err().to_string();
        assert!(err.contains("column 6 out of range"));
    }

    #[test]
    fn test_contents_column_zero_rejected() {
        let contents: Contents = serde_json::from_str(
            r#"[{ "heading": "Bad", "column": 0, "pages": [
                { "title": "X", "source": "x.md" }
            ]}]"#,
        )
        .unwrap();
        assert!(contents.validate().is_err());
    }

    #[test]
    fn test_contents_empty_rejected() {
        let contents: Contents = serde_json::from_str("[]").unwrap();
        assert!(contents.validate().is_err());
    }

    #[test]
    fn test_contents_empty_source_rejected() {
        let contents: Contents = serde_json::from_str(
            r#"[{ "heading": "Bad", "column": 1, "pages": [
                { "title": "X", "source": " " }
            ]}]"#,
        )
        .unwrap();
        assert!(contents.validate().is_err());
    }

    #[test]
    fn test_append_release_notes_always_column_five() {
        let mut contents = contents_json();
        contents.append_release_notes();

        let extra = contents.sections.last().unwrap();
        assert_eq!(extra.heading, "Extra");
        assert_eq!(extra.column, EXTRA_COLUMN);
        assert_eq!(extra.pages.len(), 1);
        assert_eq!(extra.pages[0].source, RELEASE_NOTES_SOURCE);
        assert_eq!(extra.pages[0].title, "Release Notes");
    }

    #[test]
    fn test_append_release_notes_exactly_once() {
        let mut contents = contents_json();
        let before = contents.all_pages().count();
        contents.append_release_notes();
        assert_eq!(contents.all_pages().count(), before + 1);
    }

    #[test]
    fn test_all_pages_declaration_order() {
        let contents = contents_json();
        let sources: Vec<_> = contents.all_pages().map(|p| p.source.as_str()).collect();
        assert_eq!(sources, ["intro.md", "raw.html", "api.md"]);
    }

    #[test]
    fn test_home_page_is_first_declared() {
        let contents = contents_json();
        assert_eq!(contents.home_page().source, "intro.md");
    }

    #[test]
    fn test_malformed_json_fails() {
        let result: Result<Contents, _> = serde_json::from_str("[{ not json");
        assert!(result.is_err());
    }
}
