use std::sync::OnceLock;

use crate::dom::{Document, NodeId};
use crate::selector::Selector;

const SUBMIT_SELECTORS: [&str; 7] = [
    r#"input[type="submit"]"#,
    r#"button[type="submit"]"#,
    r#"button[onclick*="submit"]"#,
    ".submit-btn",
    "#submit",
    r#"button:contains("Submit")"#,
    r#"input[value*="Submit"]"#,
];

pub const LOCK_ATTRIBUTE: &str = "data-autofill-locked";
pub const INDICATOR_CLASS: &str = "autofill-review-indicator";
pub const REVIEW_TITLE: &str = "Form auto-filled - Please review before submitting manually";
const INDICATOR_TEXT: &str = "Auto-filled - Review Required";

fn submit_selectors() -> &'static [Selector] {
    static SELECTORS: OnceLock<Vec<Selector>> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        SUBMIT_SELECTORS
            .iter()
            .filter_map(|s| match Selector::parse(s) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    tracing::error!("Bad submit selector: {}", e);
                    None
                }
            })
            .collect()
    })
}

/// Every submit-like control in the document, in document order, once each
pub fn find_submit_buttons(doc: &Document) -> Vec<NodeId> {
    let mut found: Vec<NodeId> = Vec::new();
    for selector in submit_selectors() {
        for node in selector.match_all(doc) {
            if !found.contains(&node) {
                found.push(node);
            }
        }
    }
    found.sort_unstable();
    found
}

/// Disable submit controls so a person has to review the form first.
/// Returns how many were newly locked; already-locked controls are skipped.
pub fn lock_submit_buttons(doc: &mut Document) -> usize {
    let mut locked = 0;
    for button in find_submit_buttons(doc) {
        let Some(node) = doc.node_mut(button) else {
            continue;
        };
        if node.attr(LOCK_ATTRIBUTE).is_some() {
            continue;
        }
        node.disabled = true;
        let is_input = node.tag == "input";

        doc.set_attribute(button, "disabled", "");
        doc.set_attribute(button, LOCK_ATTRIBUTE, "true");
        doc.set_attribute(button, "title", REVIEW_TITLE);
        doc.set_style(button, "opacity", "0.5");
        doc.set_style(button, "cursor", "not-allowed");

        // <input> cannot hold children, so its indicator goes beside it
        let host = if is_input {
            doc.node(button).and_then(|n| n.parent)
        } else {
            Some(button)
        };
        if let Some(host) = host {
            let indicator = doc.create_element(host, "span", &[("class", INDICATOR_CLASS)]);
            doc.append_text(indicator, INDICATOR_TEXT);
        }
        locked += 1;
    }

    if locked > 0 {
        tracing::info!("Locked {} submit controls pending review", locked);
    }
    locked
}
