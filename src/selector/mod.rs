//! Typed selectors and first-match target resolution.

mod matcher;
mod parser;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dom::{Document, NodeId};

pub use parser::SelectorError;

/// Attribute test inside `[...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
}

/// A single predicate of a compound selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Predicate {
    Id(String),
    Class(String),
    Attr { name: String, op: AttrOp },
    /// 1-based position among same-tag siblings
    NthOfType(usize),
    /// Some descendant matches the inner compound
    Has(Box<Compound>),
    /// Text content contains the string (case-sensitive)
    Contains(String),
}

/// Optional tag plus predicates that must all hold for one element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Compound {
    pub tag: Option<String>,
    pub predicates: Vec<Predicate>,
}

/// Parsed selector: a compound, optionally narrowed to the N-th match in
/// document order (`input[type="text"] >> nth=2`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    compound: Compound,
    nth: Option<usize>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let (compound, nth) = parser::parse(source)?;
        Ok(Self {
            source: source.trim().to_string(),
            compound,
            nth,
        })
    }

    /// Parse a list of selector strings, keeping their order
    pub fn parse_list<S: AsRef<str>>(sources: &[S]) -> Result<Vec<Self>, SelectorError> {
        sources.iter().map(|s| Self::parse(s.as_ref())).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Does this element satisfy the compound part (ignoring any `nth`)?
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        matcher::matches(&self.compound, doc, id)
    }

    /// All matching elements in document order (ignoring any `nth`)
    pub fn match_all(&self, doc: &Document) -> Vec<NodeId> {
        doc.elements()
            .into_iter()
            .filter(|id| self.matches(doc, *id))
            .collect()
    }

    /// The element this selector designates, if present
    pub fn first_match(&self, doc: &Document) -> Option<NodeId> {
        let mut candidates = doc
            .elements()
            .into_iter()
            .filter(|id| self.matches(doc, *id));
        match self.nth {
            Some(n) => candidates.nth(n),
            None => candidates.next(),
        }
    }
}

/// Winning selector for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub node: NodeId,
    pub selector: &'a Selector,
    /// Position of the winning selector in the list
    pub rank: usize,
}

/// Return the element designated by the first selector in `selectors` that
/// has any match. Selectors are tried strictly in order; nothing is cached.
pub fn resolve<'a>(doc: &Document, selectors: &'a [Selector]) -> Option<Resolved<'a>> {
    for (rank, selector) in selectors.iter().enumerate() {
        if let Some(node) = selector.first_match(doc) {
            tracing::debug!("Resolved '{}' (rank {}) -> node {}", selector.as_str(), rank, node);
            return Some(Resolved {
                node,
                selector,
                rank,
            });
        }
    }
    None
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Selector {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Selector::parse(&raw).map_err(serde::de::Error::custom)
    }
}
