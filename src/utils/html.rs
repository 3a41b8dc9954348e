//! HTML document rewriting.
//!
//! Event-stream transforms over `quick-xml`: slot substitution by element
//! id, heading anchor assignment, table styling, and `<head>` injection.
//! Templates and rendered fragments both go through this layer; the
//! replacement markup written into slots is produced by this crate and is
//! trusted.

use anyhow::Result;
use quick_xml::{
    Reader, Writer,
    escape::{escape, unescape},
    events::{BytesEnd, BytesStart, Event},
};
use std::collections::HashMap;
use std::io::{Cursor, Write};

pub type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Class that opts a table out of the content styling pass.
pub const UNSTYLED_CLASS: &str = "unstyled";

/// Class applied to content tables.
pub const STYLED_TABLE_CLASS: &str = "dg-table";

/// A heading collected from a content fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub level: u8,
    pub anchor: String,
    pub text: String,
}

#[inline]
pub fn create_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader
}

#[inline]
fn into_string(writer: XmlWriter) -> Result<String> {
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Escape text for use in element content or attribute values.
#[inline]
pub fn escape_text(text: &str) -> String {
    escape(text).into_owned()
}

/// Render a name+url pair as a link, or as plain text when the url is
/// empty.
pub fn link_or_text(text: &str, url: &str) -> String {
    if url.trim().is_empty() {
        escape_text(text)
    } else {
        format!(
            "<a href=\"{}\">{}</a>",
            escape_text(url.trim()),
            escape_text(text)
        )
    }
}

/// Read an element's `id` attribute, if any.
fn elem_id(elem: &BytesStart<'_>) -> Option<String> {
    elem.attributes().flatten().find_map(|attr| {
        (attr.key.as_ref() == b"id")
            .then(|| String::from_utf8_lossy(attr.value.as_ref()).into_owned())
    })
}

/// Read an element's `class` attribute as a whitespace-split list.
fn elem_classes(elem: &BytesStart<'_>) -> Vec<String> {
    elem.attributes()
        .flatten()
        .filter(|attr| attr.key.as_ref() == b"class")
        .flat_map(|attr| {
            String::from_utf8_lossy(attr.value.as_ref())
                .split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Rebuild an element with one attribute set to a new value, preserving
/// every other attribute (avoids duplication when the attribute already
/// exists).
fn rebuild_with_attr(elem: &BytesStart<'_>, name: &str, value: &str) -> BytesStart<'static> {
    let tag = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let mut new_elem = BytesStart::new(tag);
    for attr in elem.attributes().flatten() {
        if attr.key.as_ref() != name.as_bytes() {
            new_elem.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    new_elem.push_attribute((name.as_bytes(), value.as_bytes()));
    new_elem
}

/// Skip the remaining events of the element whose `Start` was just read.
fn skip_to_matching_end(reader: &mut Reader<&[u8]>) -> Result<BytesEnd<'static>> {
    let mut depth = 1usize;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(end) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(end.into_owned());
                }
            }
            Event::Eof => anyhow::bail!("Unclosed element while substituting slot content"),
            _ => {}
        }
    }
}

/// Slot replacements for one substitution pass.
///
/// `content` maps an element id to the markup replacing that element's
/// children; `attrs` maps an element id to an attribute assignment on
/// the element itself. The same id may appear in both. `head_extra` is
/// written immediately before `</head>` when non-empty.
#[derive(Debug, Default)]
pub struct Slots<'a> {
    pub content: HashMap<&'a str, String>,
    pub attrs: HashMap<&'a str, (&'a str, String)>,
    pub head_extra: String,
}

/// Substitute slot contents in a document.
pub fn fill_slots(html: &str, slots: &Slots<'_>) -> Result<String> {
    let mut reader = create_reader(html.as_bytes());
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(html.len())));

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => {
                let id = elem_id(&elem);
                let elem = match id.as_deref().and_then(|id| slots.attrs.get(id)) {
                    Some((name, value)) => rebuild_with_attr(&elem, name, value),
                    None => elem.to_owned(),
                };
                match id.as_deref().and_then(|id| slots.content.get(id)) {
                    Some(replacement) => {
                        writer.write_event(Event::Start(elem))?;
                        let end = skip_to_matching_end(&mut reader)?;
                        writer.get_mut().write_all(replacement.as_bytes())?;
                        writer.write_event(Event::End(end))?;
                    }
                    None => writer.write_event(Event::Start(elem))?,
                }
            }
            Ok(Event::Empty(elem)) => {
                let elem = match elem_id(&elem).as_deref().and_then(|id| slots.attrs.get(id)) {
                    Some((name, value)) => rebuild_with_attr(&elem, name, value),
                    None => elem.to_owned(),
                };
                writer.write_event(Event::Empty(elem))?;
            }
            Ok(Event::End(elem)) => {
                if elem.name().as_ref() == b"head" && !slots.head_extra.is_empty() {
                    writer.get_mut().write_all(slots.head_extra.as_bytes())?;
                }
                writer.write_event(Event::End(elem))?;
            }
            Ok(Event::Eof) => break,
            Ok(event) => writer.write_event(event)?,
            Err(e) => anyhow::bail!(
                "HTML parse error at position {}: {:?}",
                reader.error_position(),
                e
            ),
        }
    }

    into_string(writer)
}

/// Anchor and style a rendered content fragment.
///
/// Every `h1`–`h6` gets an `id` derived from its text (collected into the
/// returned heading list); every `<table>` without the opt-out class gets
/// the content styling class.
pub fn transform_content(fragment: &str) -> Result<(String, Vec<Heading>)> {
    let mut reader = create_reader(fragment.as_bytes());
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(fragment.len())));
    let mut headings = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => match heading_level(&elem) {
                Some(level) => {
                    write_anchored_heading(&elem, level, &mut reader, &mut writer, &mut headings)?;
                }
                None if elem.name().as_ref() == b"table" => {
                    writer.write_event(Event::Start(styled_table(&elem)))?;
                }
                None => writer.write_event(Event::Start(elem))?,
            },
            Ok(Event::Eof) => break,
            Ok(event) => writer.write_event(event)?,
            Err(e) => anyhow::bail!(
                "HTML parse error at position {}: {:?}",
                reader.error_position(),
                e
            ),
        }
    }

    Ok((into_string(writer)?, headings))
}

fn heading_level(elem: &BytesStart<'_>) -> Option<u8> {
    match elem.name().as_ref() {
        [b'h', digit @ b'1'..=b'6'] => Some(digit - b'0'),
        _ => None,
    }
}

/// Buffer a heading's children, derive the anchor from the collected
/// text, then write the heading with its `id` assigned.
fn write_anchored_heading(
    elem: &BytesStart<'_>,
    level: u8,
    reader: &mut Reader<&[u8]>,
    writer: &mut XmlWriter,
    headings: &mut Vec<Heading>,
) -> Result<()> {
    let mut inner = Vec::new();
    let mut text = String::new();
    let mut depth = 1usize;

    let end = loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                inner.push(Event::Start(e.to_owned()));
            }
            Event::End(e) => {
                depth -= 1;
                if depth == 0 {
                    break e.to_owned();
                }
                inner.push(Event::End(e.to_owned()));
            }
            Event::Text(t) => {
                text.push_str(&unescape(&t.decode()?)?);
                inner.push(Event::Text(t.into_owned()));
            }
            Event::Eof => anyhow::bail!("Unclosed heading element in content"),
            other => inner.push(other.into_owned()),
        }
    };

    let anchor = crate::utils::slug::heading_anchor(&text);
    writer.write_event(Event::Start(rebuild_with_attr(elem, "id", &anchor)))?;
    for event in inner {
        writer.write_event(event)?;
    }
    writer.write_event(Event::End(end))?;

    headings.push(Heading {
        level,
        anchor,
        text: text.trim().to_owned(),
    });
    Ok(())
}

/// Append the styling class to a table unless it carries the opt-out
/// marker.
fn styled_table(elem: &BytesStart<'_>) -> BytesStart<'static> {
    let classes = elem_classes(elem);
    if classes.iter().any(|c| c == UNSTYLED_CLASS) {
        return elem.to_owned();
    }
    if classes.iter().any(|c| c == STYLED_TABLE_CLASS) {
        return elem.to_owned();
    }

    let mut joined = classes.join(" ");
    if !joined.is_empty() {
        joined.push(' ');
    }
    joined.push_str(STYLED_TABLE_CLASS);
    rebuild_with_attr(elem, "class", &joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_or_text_plain_when_url_empty() {
        assert_eq!(link_or_text("Alice", ""), "Alice");
        assert_eq!(link_or_text("Alice", "   "), "Alice");
    }

    #[test]
    fn test_link_or_text_link_when_url_present() {
        assert_eq!(
            link_or_text("Alice", "https://example.com"),
            "<a href=\"https://example.com\">Alice</a>"
        );
    }

    #[test]
    fn test_link_or_text_escapes() {
        let html = link_or_text("A & B", "https://example.com/?a=1&b=2");
        assert!(html.contains("A &amp; B"));
        assert!(html.contains("a=1&amp;b=2"));
    }

    #[test]
    fn test_fill_slots_replaces_children() {
        let mut slots = Slots::default();
        slots
            .content
            .insert("dg-content", "<p>injected</p>".to_owned());
        let out = fill_slots(
            "<html><head></head><body><div id=\"dg-content\"><p>old</p></div></body></html>",
            &slots,
        )
        .unwrap();
        assert!(out.contains("<div id=\"dg-content\"><p>injected</p></div>"));
        assert!(!out.contains("old"));
    }

    #[test]
    fn test_fill_slots_ignores_unknown_ids() {
        let slots = Slots::default();
        let input = "<div id=\"other\"><p>kept</p></div>";
        let out = fill_slots(input, &slots).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_fill_slots_head_extra() {
        let slots = Slots {
            head_extra: "<link rel=\"stylesheet\" href=\"x.css\"/>".to_owned(),
            ..Default::default()
        };
        let out = fill_slots(
            "<html><head><title>t</title></head><body></body></html>",
            &slots,
        )
        .unwrap();
        assert!(out.contains("<link rel=\"stylesheet\" href=\"x.css\"/></head>"));
    }

    #[test]
    fn test_fill_slots_nested_replacement() {
        let mut slots = Slots::default();
        slots.content.insert("slot", "new".to_owned());
        let out = fill_slots("<div id=\"slot\"><span><b>deep</b></span></div>", &slots).unwrap();
        assert_eq!(out, "<div id=\"slot\">new</div>");
    }

    #[test]
    fn test_fill_slots_sets_attribute() {
        let mut slots = Slots::default();
        slots.attrs.insert("home", ("href", "intro.html".to_owned()));
        let out = fill_slots("<a id=\"home\" href=\"#\">Home</a>", &slots).unwrap();
        assert_eq!(out, "<a id=\"home\" href=\"intro.html\">Home</a>");
    }

    #[test]
    fn test_fill_slots_attr_on_empty_element() {
        let mut slots = Slots::default();
        slots
            .attrs
            .insert("refresh", ("content", "0; url=intro.html".to_owned()));
        let out = fill_slots(
            "<meta id=\"refresh\" http-equiv=\"refresh\" content=\"\"/>",
            &slots,
        )
        .unwrap();
        assert!(out.contains("content=\"0; url=intro.html\""));
    }

    #[test]
    fn test_fill_slots_attr_and_content_on_same_element() {
        let mut slots = Slots::default();
        slots.attrs.insert("home", ("href", "intro.html".to_owned()));
        slots.content.insert("home", "Widget".to_owned());
        let out = fill_slots("<a id=\"home\" href=\"#\">old</a>", &slots).unwrap();
        assert_eq!(out, "<a id=\"home\" href=\"intro.html\">Widget</a>");
    }

    #[test]
    fn test_transform_content_assigns_heading_ids() {
        let (out, headings) = transform_content("<h2>Getting Started</h2><p>x</p>").unwrap();
        assert!(out.contains("<h2 id=\"getting-started\">Getting Started</h2>"));
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].level, 2);
        assert_eq!(headings[0].anchor, "getting-started");
        assert_eq!(headings[0].text, "Getting Started");
    }

    #[test]
    fn test_transform_content_overrides_existing_id() {
        let (out, _) = transform_content("<h1 id=\"old\">New Title</h1>").unwrap();
        assert!(out.contains("id=\"new-title\""));
        assert!(!out.contains("id=\"old\""));
    }

    #[test]
    fn test_transform_content_nested_markup_in_heading() {
        let (out, headings) =
            transform_content("<h3>Use <code>docweave build</code> here</h3>").unwrap();
        assert_eq!(headings[0].anchor, "use-docweave-build-here");
        assert!(out.contains("<code>docweave build</code>"));
    }

    #[test]
    fn test_transform_content_styles_tables() {
        let (out, _) = transform_content("<table><tr><td>1</td></tr></table>").unwrap();
        assert!(out.contains("<table class=\"dg-table\">"));
    }

    #[test]
    fn test_transform_content_respects_unstyled_marker() {
        let (out, _) =
            transform_content("<table class=\"unstyled\"><tr><td>1</td></tr></table>").unwrap();
        assert!(out.contains("<table class=\"unstyled\">"));
        assert!(!out.contains(STYLED_TABLE_CLASS));
    }

    #[test]
    fn test_transform_content_appends_to_existing_classes() {
        let (out, _) = transform_content("<table class=\"wide\"><tr/></table>").unwrap();
        assert!(out.contains("class=\"wide dg-table\""));
    }

    #[test]
    fn test_transform_content_multiple_headings_in_order() {
        let (_, headings) =
            transform_content("<h1>One</h1><p>a</p><h2>Two</h2><h2>Three</h2>").unwrap();
        let anchors: Vec<_> = headings.iter().map(|h| h.anchor.as_str()).collect();
        assert_eq!(anchors, ["one", "two", "three"]);
    }

    #[test]
    fn test_transform_content_identical_text_identical_anchor() {
        let (_, headings) = transform_content("<h2>Setup</h2><h2>Setup</h2>").unwrap();
        assert_eq!(headings[0].anchor, headings[1].anchor);
    }
}
