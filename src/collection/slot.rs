use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cursor::Cursors;

/// One end of an ordered collection, or one side of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// Toward the present.
    Newer,
    /// Toward the past.
    Older,
}

impl Edge {
    /// The other edge.
    pub fn opposite(self) -> Self {
        match self {
            Edge::Newer => Edge::Older,
            Edge::Older => Edge::Newer,
        }
    }

    /// Lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Edge::Newer => "newer",
            Edge::Older => "older",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a hole operation or a backfill refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// The absolute end of the collection on the given edge.
    Boundary,
    /// The slot holding this id.
    Slot(String),
}

impl Anchor {
    /// Anchor at the slot with `id`.
    pub fn slot(id: impl Into<String>) -> Self {
        Anchor::Slot(id.into())
    }
}

/// An item held by a collection, with its hole and tombstone flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot<T> {
    pub(crate) id: String,
    pub(crate) payload: T,
    pub(crate) hole_newer: bool,
    pub(crate) hole_older: bool,
    pub(crate) deleted: bool,
    pub(crate) cursors: Option<Cursors>,
}

impl<T> Slot<T> {
    pub(crate) fn new(id: String, payload: T) -> Self {
        Self {
            id,
            payload,
            hole_newer: false,
            hole_older: false,
            deleted: false,
            cursors: None,
        }
    }

    /// Id of the held item.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The held item.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consumes the slot, returning the item.
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Whether items may be missing between this slot and its neighbor on
    /// `edge` (or beyond it, for a boundary slot).
    pub fn hole(&self, edge: Edge) -> bool {
        match edge {
            Edge::Newer => self.hole_newer,
            Edge::Older => self.hole_older,
        }
    }

    /// Whether the item was deleted upstream.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Cursors of the page that delivered the item, if known.
    pub fn cursors(&self) -> Option<&Cursors> {
        self.cursors.as_ref()
    }

    pub(crate) fn set_hole(&mut self, edge: Edge, value: bool) {
        match edge {
            Edge::Newer => self.hole_newer = value,
            Edge::Older => self.hole_older = value,
        }
    }
}
