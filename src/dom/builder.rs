use scraper::{ElementRef, Html};

use super::types::{Document, NodeId};

/// Tags whose text is never page content
const SKIPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Build a [`Document`] from HTML markup
pub fn parse_html(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new();
    let root = doc.root();
    build_element(parsed.root_element(), root, &mut doc);
    doc
}

/// Copy one element and its subtree into the arena
fn build_element(element: ElementRef<'_>, parent: NodeId, doc: &mut Document) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }

    let attrs: Vec<(&str, &str)> = element.value().attrs().collect();
    let id = doc.create_element(parent, name, &attrs);

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            build_element(child_element, id, doc);
        } else if let Some(text) = child.value().as_text() {
            doc.append_text(id, text);
        }
    }

    doc.settle_control(id);
}
