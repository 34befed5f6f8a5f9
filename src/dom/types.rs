use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::events::{DispatchedEvent, EventKind};

/// Arena index of a node inside a [`Document`]
pub type NodeId = usize;

/// Input types that accept free text and are filled like a text box
const TEXT_INPUT_TYPES: [&str; 8] = [
    "text", "tel", "email", "number", "search", "url", "password", "",
];

/// Tag given to the synthetic root node
const ROOT_TAG: &str = "#document";

/// Option in a select dropdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectOption {
    pub node: NodeId,
    pub value: String,
    pub text: String,
    pub selected: bool,
}

/// How a form control receives a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldControl {
    /// `<select>`: a value is applied by choosing one of its options
    Dropdown,
    /// `<textarea>` or an `<input>` of a text-ish type
    TextLike,
}

/// Element node in the document arena
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Text owned directly by this element (not its descendants)
    pub text: String,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
    /// Live form value; initialised from markup, then owned by the document
    pub value: String,
    pub disabled: bool,
    pub readonly: bool,
    /// Only meaningful for `<option>`
    pub selected: bool,
    pub style: BTreeMap<String, String>,
    pub detached: bool,
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|c| c.split_whitespace().any(|part| part == class))
            .unwrap_or(false)
    }

    /// Classify this element as a fillable control, if it is one
    pub fn control(&self) -> Option<FieldControl> {
        match self.tag.as_str() {
            "select" => Some(FieldControl::Dropdown),
            "textarea" => Some(FieldControl::TextLike),
            "input" => {
                let kind = self.attr("type").unwrap_or("").to_ascii_lowercase();
                TEXT_INPUT_TYPES
                    .contains(&kind.as_str())
                    .then_some(FieldControl::TextLike)
            }
            _ => None,
        }
    }
}

/// Snapshot of a form control's live state
#[derive(Debug, Clone, Serialize)]
pub struct ControlSnapshot {
    pub node: NodeId,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub value: String,
    pub disabled: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
}

/// Mutable in-memory document with form-control state and an event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    nodes: Vec<Node>,
    events: Vec<DispatchedEvent>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only the root node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                id: 0,
                tag: ROOT_TAG.to_string(),
                ..Default::default()
            }],
            events: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    /// The `<body>` element, or the root when the markup had none
    pub fn body(&self) -> NodeId {
        self.elements()
            .into_iter()
            .find(|id| self.nodes[*id].tag == "body")
            .unwrap_or(self.root())
    }

    /// Get an attached node
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id).filter(|n| !n.detached)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id).filter(|n| !n.detached)
    }

    /// Append a new element under `parent` and return its id
    pub fn create_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = self.nodes.len();
        let attributes: BTreeMap<String, String> = attrs
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();

        let node = Node {
            id,
            tag: tag.to_ascii_lowercase(),
            value: attributes.get("value").cloned().unwrap_or_default(),
            disabled: attributes.contains_key("disabled"),
            readonly: attributes.contains_key("readonly"),
            selected: attributes.contains_key("selected"),
            attributes,
            parent: Some(parent),
            ..Default::default()
        };

        self.nodes.push(node);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Append direct text to an element
    pub fn append_text(&mut self, id: NodeId, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            if !node.text.is_empty() {
                node.text.push(' ');
            }
            node.text.push_str(trimmed);
        }
    }

    /// Detach a node and its subtree
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root() {
            return;
        }
        let parent = self.nodes.get(id).and_then(|n| n.parent);
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p)) {
            p.children.retain(|c| *c != id);
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current) {
                node.detached = true;
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Attached descendants of `id` in document order (pre-order), excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.node(id) {
            Some(n) => n.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Every attached element in document order
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root())
    }

    /// Ancestors of `id`, nearest first, including the root
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(p) = current {
            out.push(p);
            current = self.nodes.get(p).and_then(|n| n.parent);
        }
        out
    }

    /// Concatenated text of an element and its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        if let Some(node) = self.node(id) {
            if !node.text.is_empty() {
                parts.push(node.text.clone());
            }
        }
        for d in self.descendants(id) {
            let text = &self.nodes[d].text;
            if !text.is_empty() {
                parts.push(text.clone());
            }
        }
        parts.join(" ")
    }

    /// Options of a `<select>` in document order
    pub fn options(&self, select: NodeId) -> Vec<SelectOption> {
        self.descendants(select)
            .into_iter()
            .filter(|id| self.nodes[*id].tag == "option")
            .map(|id| {
                let text = self.text_content(id);
                let node = &self.nodes[id];
                SelectOption {
                    node: id,
                    value: node.attr("value").map(str::to_string).unwrap_or_else(|| text.clone()),
                    text,
                    selected: node.selected,
                }
            })
            .collect()
    }

    /// Mark one option of a select as chosen and sync the select's value
    pub fn choose_option(&mut self, select: NodeId, option: NodeId) -> bool {
        let options = self.options(select);
        let Some(chosen) = options.iter().find(|o| o.node == option).cloned() else {
            return false;
        };
        for o in &options {
            self.nodes[o.node].selected = o.node == option;
        }
        self.nodes[select].value = chosen.value;
        true
    }

    /// Settle initial control state once an element's subtree has been built
    pub(crate) fn settle_control(&mut self, id: NodeId) {
        let tag = self.nodes[id].tag.clone();
        match tag.as_str() {
            "textarea" => {
                self.nodes[id].value = self.text_content(id);
            }
            "select" => {
                let options = self.options(id);
                let initial = options
                    .iter()
                    .rev()
                    .find(|o| o.selected)
                    .or_else(|| options.first())
                    .map(|o| o.node);
                if let Some(option) = initial {
                    self.choose_option(id, option);
                }
            }
            _ => {}
        }
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.node(id).map(|n| n.value.as_str())
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.value = value.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(node) = self.node_mut(id) {
            node.attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) {
        if let Some(node) = self.node_mut(id) {
            node.style.insert(property.to_string(), value.to_string());
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.style.get(property))
            .map(|s| s.as_str())
    }

    /// Dispatch a synthetic event; bubbling events travel to every ancestor
    pub fn dispatch_event(&mut self, target: NodeId, kind: EventKind, bubbles: bool) {
        let mut path = vec![target];
        if bubbles {
            path.extend(self.ancestors(target));
        }
        self.events.push(DispatchedEvent {
            kind,
            target,
            bubbles,
            path,
        });
    }

    pub fn events(&self) -> &[DispatchedEvent] {
        &self.events
    }

    /// Events a listener attached at `node` would have seen
    pub fn events_observed_at(&self, node: NodeId) -> Vec<&DispatchedEvent> {
        self.events
            .iter()
            .filter(|e| e.path.contains(&node))
            .collect()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Live state of every form control, in document order
    pub fn form_controls(&self) -> Vec<ControlSnapshot> {
        self.elements()
            .into_iter()
            .filter_map(|id| self.node(id))
            .filter(|n| matches!(n.tag.as_str(), "input" | "select" | "textarea" | "button"))
            .map(|n| ControlSnapshot {
                node: n.id,
                tag: n.tag.clone(),
                name: n.attr("name").map(str::to_string),
                id: n.attr("id").map(str::to_string),
                input_type: n.attr("type").map(str::to_string),
                placeholder: n.attr("placeholder").map(str::to_string),
                value: n.value.clone(),
                disabled: n.disabled,
                style: n.style.clone(),
            })
            .collect()
    }
}
