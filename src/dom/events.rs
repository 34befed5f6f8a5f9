use serde::{Deserialize, Serialize};

use super::types::NodeId;

/// Synthetic DOM event types the applicator emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Focus,
    Input,
    Change,
    Blur,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Focus => "focus",
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Blur => "blur",
        }
    }
}

/// A dispatched event and the nodes it propagated through (target first)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchedEvent {
    pub kind: EventKind,
    pub target: NodeId,
    pub bubbles: bool,
    pub path: Vec<NodeId>,
}
