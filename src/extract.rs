//! Plain-text extraction from legacy XML and destination HTML.
//!
//! The legacy side is parsed leniently: mismatched or unmatched end tags,
//! unknown entities and truncated documents keep whatever text was read up
//! to that point. Elements named in the exclusion list are dropped together
//! with their whole subtree. The destination side is parsed as HTML and all
//! visible text is returned.

use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{Html, Node};
use thiserror::Error;
use tracing::debug;

/// Legacy content that cannot be reduced to text at all.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExtractError {
    #[error("document has no root element")]
    NoRootElement,
    #[error("malformed XML at byte {position}: {message}")]
    Malformed { position: u64, message: String },
}

/// Extract the text of a legacy XML blob, skipping excluded elements.
///
/// Text fragments are joined with single spaces in document order. The
/// root element itself is never excluded, only its descendants.
pub fn legacy_text(xml: &str, excluded_tags: &[String]) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut parts: Vec<String> = Vec::new();
    let mut open: Vec<Vec<u8>> = Vec::new();
    // Depth at which the excluded subtree we are inside of was opened.
    let mut skip_from: Option<usize> = None;
    let mut saw_root = false;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let position = reader.buffer_position() as u64;
                if !saw_root {
                    return Err(ExtractError::Malformed {
                        position,
                        message: e.to_string(),
                    });
                }
                debug!("recovering from XML error at byte {}: {}", position, e);
                break;
            }
        };

        match event {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                saw_root = true;
                if skip_from.is_none() && !open.is_empty() && is_excluded(&name, excluded_tags) {
                    skip_from = Some(open.len());
                }
                open.push(name);
            }
            Event::Empty(_) => {
                if open.is_empty() {
                    // self-closing root
                    saw_root = true;
                    break;
                }
            }
            Event::End(e) => {
                let name = e.name();
                // An end tag closes the nearest matching open element and
                // everything opened inside it; strays are dropped.
                if let Some(pos) = open.iter().rposition(|n| n.as_slice() == name.as_ref()) {
                    open.truncate(pos);
                    if matches!(skip_from, Some(depth) if open.len() <= depth) {
                        skip_from = None;
                    }
                    if open.is_empty() {
                        break;
                    }
                }
            }
            Event::Text(e) => {
                if !open.is_empty() && skip_from.is_none() {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(_) => String::from_utf8_lossy(&e).into_owned(),
                    };
                    parts.push(text);
                }
            }
            Event::CData(e) => {
                if !open.is_empty() && skip_from.is_none() {
                    parts.push(String::from_utf8_lossy(&e).into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ExtractError::NoRootElement);
    }
    Ok(parts.join(" "))
}

fn is_excluded(name: &[u8], excluded_tags: &[String]) -> bool {
    excluded_tags.iter().any(|tag| tag.as_bytes() == name)
}

/// Extract every text node of a destination HTML blob, joined by spaces.
///
/// No element is skipped: text under `head`, `title`, `script` and `style`
/// counts as destination vocabulary too.
pub fn destination_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => Some(&**text),
            _ => None,
        })
        .collect::<Vec<&str>>()
        .join(" ")
}
