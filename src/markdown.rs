//! Markdown documents with metadata headers.
//!
//! Guides are plain markdown files that may open with a block of
//! `Key: value` lines:
//!
//! ```text
//! Title: Getting started
//! Section: Guides
//!
//! # Welcome
//! ...
//! ```
//!
//! The header ends at the first line that is blank, has no colon, or whose
//! key does not start with a letter. Keys are lower-cased and values trimmed;
//! everything from the terminating line onward is the body, which is
//! converted to HTML with GitHub's markdown extensions.

use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::BTreeMap;

/// Metadata header and remaining body of a markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    pub metadata: BTreeMap<String, String>,
    pub body: String,
}

/// Split a document into its metadata header and body.
///
/// A document without a header yields empty metadata and the whole input
/// as body (line endings normalised to `\n`).
pub fn parse_front_matter(doc: &str) -> FrontMatter {
    let mut metadata = BTreeMap::new();
    let mut body = String::new();
    let mut lines = doc.lines();

    for line in lines.by_ref() {
        match metadata_entry(line) {
            Some((key, value)) => {
                metadata.insert(key, value);
            }
            None => {
                if !line.is_empty() {
                    body.push_str(line);
                    body.push('\n');
                }
                break;
            }
        }
    }
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }

    FrontMatter { metadata, body }
}

/// A `key: value` header line, or `None` if the line ends the header.
fn metadata_entry(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if !key.chars().next()?.is_alphabetic() {
        return None;
    }
    Some((key.to_lowercase(), value.trim().to_string()))
}

fn gfm_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_GFM
}

/// Convert markdown text to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, gfm_options());
    let mut html = String::new();
    md_html::push_html(&mut html, parser);
    html
}

/// Convert a raw document into HTML plus its metadata header.
pub fn render_document(doc: &[u8]) -> (Vec<u8>, BTreeMap<String, String>) {
    let text = String::from_utf8_lossy(doc);
    let FrontMatter { metadata, body } = parse_front_matter(&text);
    (markdown_to_html(&body).into_bytes(), metadata)
}
