//! In-memory document model the autofill pipeline runs against.
//!
//! Pages arrive as HTML, are parsed into an arena of element nodes, and from
//! then on carry live form state (values, selected options, inline styles,
//! disabled flags) plus a log of every synthetic event dispatched on them.

mod builder;
mod events;
pub mod types;

pub use builder::parse_html;
pub use events::{DispatchedEvent, EventKind};
pub use types::{ControlSnapshot, Document, FieldControl, Node, NodeId, SelectOption};
