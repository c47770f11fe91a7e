//! Static lookup from wire tag to event kind
//!
//! The table is built once from [`EventKind::ALL`] and never mutated. An
//! unrecognised tag is an expected outcome: newer producers may emit tags this
//! build does not know about.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use super::types::EventKind;

static TAG_TABLE: LazyLock<HashMap<&'static str, EventKind>> =
    LazyLock::new(|| EventKind::ALL.iter().map(|kind| (kind.tag(), *kind)).collect());

impl EventKind {
    /// Look up the kind for a wire tag; `None` for tags this build does not know
    pub fn from_tag(tag: &str) -> Option<Self> {
        TAG_TABLE.get(tag).copied()
    }
}

impl FromStr for EventKind {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::from_tag(s).ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// Returned when parsing a tag that is not in the registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown event type: {0}")]
pub struct UnknownTag(pub String);

/// All known tags, in wire-table order
pub fn known_tags() -> impl Iterator<Item = &'static str> {
    EventKind::ALL.iter().map(|kind| kind.tag())
}
