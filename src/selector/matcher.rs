use crate::dom::{Document, NodeId};

use super::{AttrOp, Compound, Predicate};

/// Check whether an element satisfies every part of a compound selector
pub(super) fn matches(compound: &Compound, doc: &Document, id: NodeId) -> bool {
    let Some(node) = doc.node(id) else {
        return false;
    };

    if let Some(tag) = &compound.tag {
        if &node.tag != tag {
            return false;
        }
    }

    compound
        .predicates
        .iter()
        .all(|predicate| predicate_holds(predicate, doc, id))
}

fn predicate_holds(predicate: &Predicate, doc: &Document, id: NodeId) -> bool {
    let Some(node) = doc.node(id) else {
        return false;
    };

    match predicate {
        Predicate::Id(expected) => node.attr("id") == Some(expected.as_str()),
        Predicate::Class(class) => node.has_class(class),
        Predicate::Attr { name, op } => {
            let Some(actual) = node.attr(name) else {
                return false;
            };
            // Empty needles never match for substring operators, as in CSS
            match op {
                AttrOp::Exists => true,
                AttrOp::Equals(v) => actual == v,
                AttrOp::Contains(v) => !v.is_empty() && actual.contains(v.as_str()),
                AttrOp::Prefix(v) => !v.is_empty() && actual.starts_with(v.as_str()),
                AttrOp::Suffix(v) => !v.is_empty() && actual.ends_with(v.as_str()),
            }
        }
        Predicate::NthOfType(n) => position_of_type(doc, id) == Some(*n),
        Predicate::Has(inner) => doc
            .descendants(id)
            .into_iter()
            .any(|d| matches(inner, doc, d)),
        Predicate::Contains(text) => doc.text_content(id).contains(text.as_str()),
    }
}

/// 1-based index of `id` among its siblings with the same tag
fn position_of_type(doc: &Document, id: NodeId) -> Option<usize> {
    let node = doc.node(id)?;
    let parent = doc.node(node.parent?)?;
    parent
        .children
        .iter()
        .filter_map(|c| doc.node(*c))
        .filter(|sibling| sibling.tag == node.tag)
        .position(|sibling| sibling.id == id)
        .map(|p| p + 1)
}

#[cfg(test)]
mod tests {
    use crate::dom::parse_html;
    use crate::selector::Selector;

    #[test]
    fn test_nth_of_type_is_per_parent() {
        let doc = parse_html(
            r#"<div><input type="text" id="a"><input type="text" id="b"></div>
               <div><input type="text" id="c"></div>"#,
        );
        let first = Selector::parse(r#"input[type="text"]:nth-of-type(1)"#).unwrap();
        let ids: Vec<_> = first
            .match_all(&doc)
            .into_iter()
            .map(|n| doc.node(n).unwrap().attr("id").unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_attribute_substring_is_case_sensitive() {
        let doc = parse_html(r#"<input placeholder="Enter Mobile No">"#);
        assert!(Selector::parse(r#"input[placeholder*="Mobile"]"#)
            .unwrap()
            .first_match(&doc)
            .is_some());
        assert!(Selector::parse(r#"input[placeholder*="mobile"]"#)
            .unwrap()
            .first_match(&doc)
            .is_none());
        assert!(Selector::parse(r#"input[placeholder*=""]"#)
            .unwrap()
            .first_match(&doc)
            .is_none());
    }

    #[test]
    fn test_has_and_contains() {
        let doc = parse_html(
            r#"<select id="district"><option>Kutch</option></select>
               <select id="city"><option value="Ahmedabad">Ahmedabad</option></select>
               <button type="button">Cancel</button>
               <button type="button">Submit Application</button>"#,
        );

        let city = Selector::parse(r#"select:has(option[value*="Ahmedabad"])"#).unwrap();
        let node = city.first_match(&doc).unwrap();
        assert_eq!(doc.node(node).unwrap().attr("id"), Some("city"));

        let submit = Selector::parse(r#"button:contains("Submit")"#).unwrap();
        assert_eq!(submit.match_all(&doc).len(), 1);
    }

    #[test]
    fn test_class_and_id() {
        let doc = parse_html(r#"<select class="form-control  big" id="discom"></select>"#);
        for css in ["select.form-control", ".big", "#discom", "select#discom.big"] {
            assert!(
                Selector::parse(css).unwrap().first_match(&doc).is_some(),
                "{} should match",
                css
            );
        }
        assert!(Selector::parse("select.form").unwrap().first_match(&doc).is_none());
    }
}
