//! Navigation derivation.
//!
//! Groups sections into column buckets, derives per-page output paths,
//! and renders the site table of contents. The column-major traversal
//! computed here is the single source of page ordering: the web TOC and
//! the PDF page list both consume it, so they can never disagree.

use crate::metadata::{Contents, EXTRA_COLUMN, PageEntry, Parameters, Section};
use crate::utils::html::{UNSTYLED_CLASS, XmlWriter};
use anyhow::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// Columns shown in the visible TOC grid; the last column is reserved
/// for the side entries (ownership, release notes).
const GRID_COLUMNS: u8 = EXTRA_COLUMN - 1;

/// Output path of the auxiliary ownership page.
pub const OWNERSHIP_PAGE: &str = "ownership.html";

/// Sections grouped by column, section order preserved within each
/// bucket.
#[derive(Debug)]
pub struct SortedPages<'a> {
    columns: Vec<Vec<&'a Section>>,
}

impl<'a> SortedPages<'a> {
    /// Bucket the (augmented) contents sections by column.
    pub fn build(contents: &'a Contents) -> Self {
        let mut columns: Vec<Vec<&'a Section>> = (0..EXTRA_COLUMN).map(|_| Vec::new()).collect();
        for section in &contents.sections {
            columns[(section.column - 1) as usize].push(section);
        }
        Self { columns }
    }

    /// Sections assigned to a column (1-based).
    pub fn column(&self, column: u8) -> &[&'a Section] {
        &self.columns[(column - 1) as usize]
    }

    /// Every page in column-major order: columns 1-5, sections in bucket
    /// order, pages in section order. This ordering is shared verbatim
    /// between the web TOC and the PDF page list.
    pub fn ordered_pages(&self) -> Vec<&'a PageEntry> {
        self.columns
            .iter()
            .flat_map(|sections| sections.iter())
            .flat_map(|section| section.pages.iter())
            .collect()
    }
}

/// Derive a page's output path from its source identifier: trim at the
/// last dot, append `.html`. Identifiers without a dot keep their full
/// name. The truncation rule is load-bearing for link compatibility; do
/// not reinterpret it.
pub fn output_rel_path(source: &str) -> String {
    match source.rfind('.') {
        Some(idx) => format!("{}.html", &source[..idx]),
        None => format!("{source}.html"),
    }
}

/// Render the site table of contents.
///
/// Columns 1-4 become grid cells (one list per section); the fixed final
/// cell carries the ownership link, the release notes link, and - when
/// PDF output is enabled - a download button for the generated file.
/// The grid table itself is marked unstyled so the content styling pass
/// leaves it alone.
pub fn render_toc(
    sorted: &SortedPages<'_>,
    parameters: &Parameters,
    pdf_enabled: bool,
) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut table = BytesStart::new("table");
    table.push_attribute(("class", format!("{UNSTYLED_CLASS} dg-toc").as_str()));
    writer.write_event(Event::Start(table))?;
    writer.write_event(Event::Start(BytesStart::new("tr")))?;

    for column in 1..=GRID_COLUMNS {
        writer.write_event(Event::Start(BytesStart::new("td")))?;
        for section in sorted.column(column) {
            write_section_list(&mut writer, section)?;
        }
        writer.write_event(Event::End(BytesEnd::new("td")))?;
    }

    write_side_cell(&mut writer, parameters, pdf_enabled)?;

    writer.write_event(Event::End(BytesEnd::new("tr")))?;
    writer.write_event(Event::End(BytesEnd::new("table")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// One section: heading line plus a list of page links.
fn write_section_list(writer: &mut XmlWriter, section: &Section) -> Result<()> {
    let mut heading = BytesStart::new("p");
    heading.push_attribute(("class", "dg-toc-heading"));
    writer.write_event(Event::Start(heading))?;
    writer.write_event(Event::Text(BytesText::new(
        &section.heading,
    )))?;
    writer.write_event(Event::End(BytesEnd::new("p")))?;

    writer.write_event(Event::Start(BytesStart::new("ul")))?;
    for page in &section.pages {
        write_page_link(writer, &output_rel_path(&page.source), &page.title)?;
    }
    writer.write_event(Event::End(BytesEnd::new("ul")))?;
    Ok(())
}

/// The fixed final cell: ownership, release notes, optional PDF button.
fn write_side_cell(
    writer: &mut XmlWriter,
    parameters: &Parameters,
    pdf_enabled: bool,
) -> Result<()> {
    let mut cell = BytesStart::new("td");
    cell.push_attribute(("class", "dg-toc-side"));
    writer.write_event(Event::Start(cell))?;

    writer.write_event(Event::Start(BytesStart::new("ul")))?;
    write_page_link(writer, OWNERSHIP_PAGE, "Ownership")?;
    write_page_link(
        writer,
        &output_rel_path(crate::metadata::RELEASE_NOTES_SOURCE),
        "Release Notes",
    )?;
    writer.write_event(Event::End(BytesEnd::new("ul")))?;

    if pdf_enabled {
        let mut button = BytesStart::new("a");
        button.push_attribute(("class", "dg-pdf-button"));
        button.push_attribute(("href", parameters.pdf_filename().as_str()));
        writer.write_event(Event::Start(button))?;
        writer.write_event(Event::Text(BytesText::new(
            "PDF version",
        )))?;
        writer.write_event(Event::End(BytesEnd::new("a")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("td")))?;
    Ok(())
}

fn write_page_link(writer: &mut XmlWriter, href: &str, title: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("li")))?;
    let mut link = BytesStart::new("a");
    link.push_attribute(("href", href));
    writer.write_event(Event::Start(link))?;
    writer.write_event(Event::Text(BytesText::new(title)))?;
    writer.write_event(Event::End(BytesEnd::new("a")))?;
    writer.write_event(Event::End(BytesEnd::new("li")))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contents() -> Contents {
        let mut contents: Contents = serde_json::from_str(
            r#"[
                { "heading": "Advanced", "column": 2, "pages": [
                    { "title": "Tuning", "source": "tuning.md" }
                ]},
                { "heading": "Guide", "column": 1, "pages": [
                    { "title": "Intro", "source": "intro.md" },
                    { "title": "Setup", "source": "setup.md" }
                ]},
                { "heading": "More Guide", "column": 1, "pages": [
                    { "title": "Extras", "source": "extras.md" }
                ]}
            ]"#,
        )
        .unwrap();
        contents.append_release_notes();
        contents
    }

    fn sample_parameters() -> Parameters {
        serde_json::from_str(crate::metadata::fixtures::PARAMS).unwrap()
    }

    #[test]
    fn test_output_rel_path_trims_extension() {
        assert_eq!(output_rel_path("intro.md"), "intro.html");
        assert_eq!(output_rel_path("raw.html"), "raw.html");
        assert_eq!(output_rel_path("release-notes.txt"), "release-notes.html");
    }

    #[test]
    fn test_output_rel_path_trims_at_last_dot() {
        assert_eq!(output_rel_path("a.b.md"), "a.b.html");
    }

    #[test]
    fn test_output_rel_path_no_extension() {
        assert_eq!(output_rel_path("Makefile"), "Makefile.html");
    }

    #[test]
    fn test_output_rel_path_nested() {
        assert_eq!(output_rel_path("guide/setup.md"), "guide/setup.html");
    }

    #[test]
    fn test_sorted_pages_buckets_by_column() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);

        let col1: Vec<_> = sorted.column(1).iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(col1, ["Guide", "More Guide"]);
        assert_eq!(sorted.column(2).len(), 1);
        assert!(sorted.column(3).is_empty());
        assert_eq!(sorted.column(5)[0].heading, "Extra");
    }

    #[test]
    fn test_sorted_pages_preserves_declaration_order_within_bucket() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);

        // "Guide" was declared after "Advanced" but both keep their
        // relative order inside their own buckets
        let pages: Vec<_> = sorted.column(1)[0]
            .pages
            .iter()
            .map(|p| p.source.as_str())
            .collect();
        assert_eq!(pages, ["intro.md", "setup.md"]);
    }

    #[test]
    fn test_ordered_pages_column_major() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);

        let sources: Vec<_> = sorted
            .ordered_pages()
            .iter()
            .map(|p| p.source.as_str())
            .collect();
        assert_eq!(
            sources,
            [
                "intro.md",
                "setup.md",
                "extras.md",
                "tuning.md",
                "release-notes.txt"
            ]
        );
    }

    #[test]
    fn test_ordered_pages_stable_across_calls() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);
        let first: Vec<_> = sorted.ordered_pages().iter().map(|p| p.source.clone()).collect();
        let second: Vec<_> = sorted.ordered_pages().iter().map(|p| p.source.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_toc_links_pages() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);
        let toc = render_toc(&sorted, &sample_parameters(), false).unwrap();

        assert!(toc.contains("<a href=\"intro.html\">Intro</a>"));
        assert!(toc.contains("<a href=\"tuning.html\">Tuning</a>"));
        assert!(toc.contains("Guide"));
    }

    #[test]
    fn test_render_toc_suppresses_extra_column_from_grid() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);
        let toc = render_toc(&sorted, &sample_parameters(), false).unwrap();

        // The Extra section heading never appears in the grid; its page
        // is reachable through the fixed side link instead
        assert!(!toc.contains(">Extra<"));
        assert!(toc.contains("<a href=\"release-notes.html\">Release Notes</a>"));
    }

    #[test]
    fn test_render_toc_side_cell_fixed_links() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);
        let toc = render_toc(&sorted, &sample_parameters(), false).unwrap();

        assert!(toc.contains("<a href=\"ownership.html\">Ownership</a>"));
        assert!(!toc.contains("dg-pdf-button"));
    }

    #[test]
    fn test_render_toc_pdf_button_only_when_enabled() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);
        let toc = render_toc(&sorted, &sample_parameters(), true).unwrap();

        assert!(toc.contains("dg-pdf-button"));
        assert!(toc.contains("href=\"widget.pdf\""));
    }

    #[test]
    fn test_render_toc_marked_unstyled() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);
        let toc = render_toc(&sorted, &sample_parameters(), false).unwrap();

        assert!(toc.starts_with("<table class=\"unstyled dg-toc\">"));
    }

    #[test]
    fn test_render_toc_emits_all_grid_cells() {
        let contents = sample_contents();
        let sorted = SortedPages::build(&contents);
        let toc = render_toc(&sorted, &sample_parameters(), false).unwrap();

        // 4 grid cells + 1 side cell even though columns 3 and 4 are empty
        assert_eq!(toc.matches("<td").count(), 5);
    }
}
