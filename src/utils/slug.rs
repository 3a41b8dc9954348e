//! Heading anchor derivation.
//!
//! Converts heading text to the fragment identifiers used by in-page
//! navigation and the PDF outline.

/// Derive an anchor id from heading text.
///
/// Lowercases the text and collapses every whitespace run into a single
/// hyphen. The mapping is deterministic: identical heading text always
/// yields the identical anchor.
///
/// # Examples
/// ```ignore
/// heading_anchor("Getting Started")   // → "getting-started"
/// heading_anchor("  API   Reference") // → "api-reference"
/// ```
pub fn heading_anchor(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
