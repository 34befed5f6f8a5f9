use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::dom::{Document, EventKind, FieldControl, NodeId, SelectOption};

pub const SUCCESS_BACKGROUND: &str = "#d4edda";
pub const SUCCESS_BORDER: &str = "2px solid #28a745";

/// How a dropdown option is matched against the requested value.
/// Comparison is case-insensitive on either the option text or its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionMatch {
    Equals,
    Contains,
    /// Prefer an exact match, fall back to a substring match
    #[default]
    EqualsThenContains,
}

impl OptionMatch {
    /// Pick the option to select for `wanted`, if any
    pub fn pick<'a>(&self, options: &'a [SelectOption], wanted: &str) -> Option<&'a SelectOption> {
        let needle = wanted.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        let equals = |o: &&SelectOption| {
            o.text.trim().to_lowercase() == needle || o.value.trim().to_lowercase() == needle
        };
        let contains = |o: &&SelectOption| {
            o.text.to_lowercase().contains(&needle) || o.value.to_lowercase().contains(&needle)
        };

        match self {
            OptionMatch::Equals => options.iter().find(equals),
            OptionMatch::Contains => options.iter().find(contains),
            OptionMatch::EqualsThenContains => options
                .iter()
                .find(equals)
                .or_else(|| options.iter().find(contains)),
        }
    }
}

/// Whether values are written at once or typed one character per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    #[default]
    Immediate,
    Typing { tick: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The control now holds `written`
    Filled { written: String },
    /// A dropdown had no option matching the value
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("element {0} is no longer in the document")]
    Detached(NodeId),

    #[error("element {0} is disabled")]
    Disabled(NodeId),

    #[error("element {0} is read-only")]
    ReadOnly(NodeId),

    #[error("<{tag}> element {node} cannot take a value")]
    Unsupported { node: NodeId, tag: String },
}

/// Check that `node` can be written and say how
fn writable(doc: &Document, node: NodeId) -> Result<FieldControl, ApplyError> {
    let element = doc.node(node).ok_or(ApplyError::Detached(node))?;
    let control = element.control().ok_or_else(|| ApplyError::Unsupported {
        node,
        tag: element.tag.clone(),
    })?;

    if element.disabled {
        return Err(ApplyError::Disabled(node));
    }
    if control == FieldControl::TextLike && element.readonly {
        return Err(ApplyError::ReadOnly(node));
    }
    Ok(control)
}

/// Set `value` on `node` and fire `input`, `change`, `blur`, all bubbling
pub fn apply(
    doc: &mut Document,
    node: NodeId,
    value: &str,
    option_match: OptionMatch,
) -> Result<ApplyOutcome, ApplyError> {
    match writable(doc, node)? {
        FieldControl::Dropdown => apply_dropdown(doc, node, value, option_match),
        FieldControl::TextLike => {
            doc.set_value(node, "");
            doc.set_value(node, value);
            finish(doc, node, &[EventKind::Input, EventKind::Change, EventKind::Blur]);
            Ok(ApplyOutcome::Filled {
                written: value.to_string(),
            })
        }
    }
}

/// Like [`apply`], but text controls receive one character per `tick` with
/// an `input` event after each. Dropdowns are chosen immediately.
pub async fn apply_typed(
    doc: &mut Document,
    node: NodeId,
    value: &str,
    option_match: OptionMatch,
    tick: Duration,
) -> Result<ApplyOutcome, ApplyError> {
    if writable(doc, node)? == FieldControl::Dropdown {
        return apply_dropdown(doc, node, value, option_match);
    }

    doc.set_value(node, "");
    let mut typed = String::with_capacity(value.len());
    for c in value.chars() {
        typed.push(c);
        if !doc.set_value(node, &typed) {
            return Err(ApplyError::Detached(node));
        }
        doc.dispatch_event(node, EventKind::Input, true);
        tokio::time::sleep(tick).await;
    }

    finish(doc, node, &[EventKind::Change, EventKind::Blur]);
    Ok(ApplyOutcome::Filled { written: typed })
}

fn apply_dropdown(
    doc: &mut Document,
    node: NodeId,
    value: &str,
    option_match: OptionMatch,
) -> Result<ApplyOutcome, ApplyError> {
    let options = doc.options(node);
    let Some(option) = option_match.pick(&options, value) else {
        tracing::debug!("No option of select {} matches '{}'", node, value);
        return Ok(ApplyOutcome::NoMatch);
    };

    if !doc.choose_option(node, option.node) {
        return Err(ApplyError::Detached(node));
    }
    finish(doc, node, &[EventKind::Input, EventKind::Change, EventKind::Blur]);
    Ok(ApplyOutcome::Filled {
        written: option.text.clone(),
    })
}

fn finish(doc: &mut Document, node: NodeId, events: &[EventKind]) {
    for kind in events {
        doc.dispatch_event(node, *kind, true);
    }
    doc.set_style(node, "background-color", SUCCESS_BACKGROUND);
    doc.set_style(node, "border", SUCCESS_BORDER);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::selector::Selector;

    fn find(doc: &Document, css: &str) -> NodeId {
        Selector::parse(css).unwrap().first_match(doc).unwrap()
    }

    fn kinds(doc: &Document, node: NodeId) -> Vec<EventKind> {
        doc.events_observed_at(node).iter().map(|e| e.kind).collect()
    }

    const CITY: &str = r#"<form id="f"><select id="city">
        <option value="">Select City</option>
        <option value="AMD">Ahmedabad</option>
        <option value="SUR">Surat</option>
        <option value="VAD">Vadodara</option>
    </select><input type="text" id="svc"><input type="text" id="ro" readonly>
    <input type="text" id="off" disabled><input type="checkbox" id="cb"></form>"#;

    #[test]
    fn test_dropdown_case_insensitive_match() {
        let mut doc = parse_html(CITY);
        let select = find(&doc, "#city");
        let form = find(&doc, "#f");

        let outcome = apply(&mut doc, select, "ahmedabad", OptionMatch::default()).unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::Filled {
                written: "Ahmedabad".to_string()
            }
        );
        assert_eq!(doc.value(select), Some("AMD"));
        assert!(kinds(&doc, form).contains(&EventKind::Change));
    }

    #[test]
    fn test_dropdown_match_modes() {
        let doc = parse_html(CITY);
        let options = doc.options(find(&doc, "#city"));

        assert!(OptionMatch::Equals.pick(&options, "ahmed").is_none());
        assert_eq!(OptionMatch::Contains.pick(&options, "ahmed").unwrap().value, "AMD");
        assert_eq!(OptionMatch::Equals.pick(&options, "sur").unwrap().text, "Surat");
        assert_eq!(
            OptionMatch::EqualsThenContains.pick(&options, "vad").unwrap().text,
            "Vadodara"
        );
        assert!(OptionMatch::Contains.pick(&options, "  ").is_none());
    }

    #[test]
    fn test_dropdown_no_match_leaves_state() {
        let mut doc = parse_html(CITY);
        let select = find(&doc, "#city");

        let outcome = apply(&mut doc, select, "Rajkot", OptionMatch::default()).unwrap();
        assert_eq!(outcome, ApplyOutcome::NoMatch);
        assert_eq!(doc.value(select), Some(""));
        assert!(doc.events().is_empty());
        assert_eq!(doc.style(select, "background-color"), None);
    }

    #[test]
    fn test_text_events_and_styling() {
        let mut doc = parse_html(CITY);
        let input = find(&doc, "#svc");
        let form = find(&doc, "#f");

        apply(&mut doc, input, "TEST123456", OptionMatch::default()).unwrap();
        assert_eq!(doc.value(input), Some("TEST123456"));
        assert_eq!(
            kinds(&doc, form),
            vec![EventKind::Input, EventKind::Change, EventKind::Blur]
        );
        assert!(doc.events().iter().all(|e| e.bubbles));
        assert_eq!(doc.style(input, "background-color"), Some(SUCCESS_BACKGROUND));
        assert_eq!(doc.style(input, "border"), Some(SUCCESS_BORDER));
    }

    #[test]
    fn test_reapplication_is_idempotent() {
        let mut doc = parse_html(CITY);
        let input = find(&doc, "#svc");
        let select = find(&doc, "#city");

        apply(&mut doc, input, "X1", OptionMatch::default()).unwrap();
        apply(&mut doc, select, "Surat", OptionMatch::default()).unwrap();
        let first = doc.form_controls();

        apply(&mut doc, input, "X1", OptionMatch::default()).unwrap();
        apply(&mut doc, select, "Surat", OptionMatch::default()).unwrap();
        let second = doc.form_controls();

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.value, b.value);
            assert_eq!(a.style, b.style);
        }
    }

    #[test]
    fn test_unwritable_controls() {
        let mut doc = parse_html(CITY);
        let ro = find(&doc, "#ro");
        let off = find(&doc, "#off");
        let cb = find(&doc, "#cb");
        let svc = find(&doc, "#svc");

        assert_eq!(
            apply(&mut doc, ro, "x", OptionMatch::default()),
            Err(ApplyError::ReadOnly(ro))
        );
        assert_eq!(
            apply(&mut doc, off, "x", OptionMatch::default()),
            Err(ApplyError::Disabled(off))
        );
        assert!(matches!(
            apply(&mut doc, cb, "x", OptionMatch::default()),
            Err(ApplyError::Unsupported { .. })
        ));

        doc.remove(svc);
        assert_eq!(
            apply(&mut doc, svc, "x", OptionMatch::default()),
            Err(ApplyError::Detached(svc))
        );
    }

    #[tokio::test]
    async fn test_typing_matches_immediate_final_state() {
        let mut typed = parse_html(CITY);
        let mut instant = parse_html(CITY);
        let input = find(&typed, "#svc");

        apply_typed(&mut typed, input, "9876", OptionMatch::default(), Duration::from_millis(1))
            .await
            .unwrap();
        apply(&mut instant, input, "9876", OptionMatch::default()).unwrap();

        assert_eq!(typed.value(input), instant.value(input));
        assert_eq!(typed.node(input).unwrap().style, instant.node(input).unwrap().style);

        let events = kinds(&typed, input);
        assert_eq!(events.iter().filter(|k| **k == EventKind::Input).count(), 4);
        assert_eq!(&events[4..], &[EventKind::Change, EventKind::Blur]);
    }
}
