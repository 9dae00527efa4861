//! Per-edge backfill state machine.
//!
//! Each edge of a feed is `Idle`, `Loading` or `Exhausted`. A trigger turns
//! into a [`Ticket`] carrying the request limiter; the page loaded for the
//! ticket is fed back through [`Coordinator::complete`]. Outside of
//! `Loading`, the state of an edge always mirrors its boundary slot: a
//! holed boundary is `Idle`, an unholed one is `Exhausted`.

use std::fmt;

use tracing::debug;

use crate::collection::{Anchor, Collection, Edge, Eviction};
use crate::cursor::{IdLimiter, Page};
use crate::ordering::Policy;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Backfill state of one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EdgeState {
    /// Nothing in flight; the boundary may have more items beyond it.
    #[default]
    Idle,
    /// A load is in flight.
    Loading,
    /// The server reported no more items beyond the boundary.
    Exhausted,
}

/// Why a trigger did not start a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Skip {
    /// A load for the edge is already in flight.
    Loading,
    /// The boundary of the edge is exhausted.
    Exhausted,
    /// The anchor slot is not held.
    UnknownAnchor,
    /// The feed is detached.
    Detached,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Skip::Loading => "edge is already loading",
            Skip::Exhausted => "edge is exhausted",
            Skip::UnknownAnchor => "anchor is not held",
            Skip::Detached => "feed is detached",
        };
        f.write_str(text)
    }
}

/// An accepted trigger: the limiter to load and where to apply the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    edge: Edge,
    anchor: Option<String>,
    boundary: bool,
    initial: bool,
    limiter: IdLimiter,
}

impl Ticket {
    /// Edge being filled. The initial load reports [`Edge::Older`].
    pub fn edge(&self) -> Edge {
        self.edge
    }

    /// Id of the anchor slot, `None` for the initial load.
    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    /// Whether the anchor was the boundary slot of the edge when planned.
    pub fn is_boundary(&self) -> bool {
        self.boundary
    }

    /// Whether this is the first load of an empty feed.
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Request window to hand to the loader.
    pub fn limiter(&self) -> &IdLimiter {
        &self.limiter
    }
}

/// What a completed backfill changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillOutcome {
    /// Edge that was filled.
    pub edge: Edge,
    /// Whether this was the initial load.
    pub initial: bool,
    /// Items returned by the loader.
    pub received: usize,
    /// Items that created new slots.
    pub inserted: usize,
    /// Whether the edge ended up exhausted.
    pub exhausted: bool,
    /// Overflow evicted by the insertion.
    pub eviction: Option<Eviction>,
}

#[derive(Debug, Clone, Copy, Default)]
struct EdgeSlot {
    state: EdgeState,
    ticket: Option<u64>,
}

/// Backfill coordinator of one feed.
#[derive(Debug, Clone)]
pub struct Coordinator {
    page_size: usize,
    newer: EdgeSlot,
    older: EdgeSlot,
    next_seq: u64,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Coordinator {
    /// A coordinator requesting `page_size` items per load.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            newer: EdgeSlot::default(),
            older: EdgeSlot::default(),
            next_seq: 1,
        }
    }

    /// Items requested per load.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current state of `edge`.
    pub fn state(&self, edge: Edge) -> EdgeState {
        self.edge(edge).state
    }

    /// Accepts a trigger for `edge` at `anchor`, or says why it is ignored.
    ///
    /// An empty collection always plans the initial load, which occupies both
    /// edges.
    pub fn plan<T, P: Policy<T>>(
        &mut self,
        collection: &Collection<T, P>,
        anchor: &Anchor,
        edge: Edge,
    ) -> Result<Ticket, Skip> {
        if collection.is_empty() {
            if self.newer.state == EdgeState::Loading || self.older.state == EdgeState::Loading {
                return Err(Skip::Loading);
            }
            let ticket = self.issue(
                Edge::Older,
                None,
                true,
                true,
                IdLimiter::with_limit(self.page_size),
            );
            self.occupy(Edge::Newer, ticket.seq);
            self.occupy(Edge::Older, ticket.seq);
            debug!(limit = self.page_size, "backfill.plan.initial");
            return Ok(ticket);
        }
        if self.state(edge) == EdgeState::Loading {
            return Err(Skip::Loading);
        }

        let slot = match anchor {
            Anchor::Boundary => collection.boundary(edge),
            Anchor::Slot(id) => collection.find_by_id(id),
        }
        .ok_or(Skip::UnknownAnchor)?;
        let id = slot.id().to_string();
        let boundary = collection.is_boundary(&Anchor::slot(id.as_str()), edge);
        if boundary && self.state(edge) == EdgeState::Exhausted {
            return Err(Skip::Exhausted);
        }

        let mut limiter = IdLimiter::with_limit(self.page_size);
        match edge {
            Edge::Newer => {
                limiter.since_id = Some(id.clone());
                limiter.max_id = collection
                    .neighbor(&id, Edge::Newer)
                    .map(|neighbor| neighbor.id().to_string());
            }
            Edge::Older => {
                let page_older = if boundary {
                    slot.cursors().and_then(|cursors| cursors.older.clone())
                } else {
                    None
                };
                limiter.max_id = Some(page_older.unwrap_or_else(|| id.clone()));
                limiter.since_id = collection
                    .neighbor(&id, Edge::Older)
                    .map(|neighbor| neighbor.id().to_string());
            }
        }
        debug!(
            edge = %edge,
            anchor = %id,
            boundary,
            max_id = ?limiter.max_id,
            since_id = ?limiter.since_id,
            "backfill.plan"
        );
        let ticket = self.issue(edge, Some(id), boundary, false, limiter);
        self.occupy(edge, ticket.seq);
        Ok(ticket)
    }

    /// Applies the page loaded for `ticket`. Returns `None` when the ticket no
    /// longer owns its edge; the page is then dropped unapplied.
    ///
    /// The gap the ticket was filling is cleared. A full page re-marks the
    /// hole on the frontier of the page, facing the rest of the gap; a short
    /// page closes the gap for good.
    pub fn complete<T, P: Policy<T>>(
        &mut self,
        collection: &mut Collection<T, P>,
        ticket: Ticket,
        page: Page<T>,
    ) -> Option<BackfillOutcome> {
        if !self.owns(&ticket) {
            debug!(edge = %ticket.edge, "backfill.complete.stale");
            return None;
        }
        let received = page.len();
        let limit = ticket.limiter.limit.unwrap_or(self.page_size);
        let full = received > 0 && received >= limit;

        let anchor = match &ticket.anchor {
            Some(id) => Anchor::Slot(id.clone()),
            None => Anchor::Boundary,
        };
        collection.clear_hole(&anchor, ticket.edge);
        let side = if ticket.initial {
            Edge::Newer
        } else {
            ticket.edge
        };
        let batch = collection.insert_page(page, side);
        if full {
            let frontier = batch
                .ids
                .iter()
                .filter_map(|id| collection.position(id).map(|pos| (pos, id)))
                .reduce(|best, next| match ticket.edge {
                    Edge::Newer if next.0 < best.0 => next,
                    Edge::Older if next.0 > best.0 => next,
                    _ => best,
                })
                .map(|(_, id)| Anchor::Slot(id.clone()));
            collection.mark_hole(frontier.as_ref().unwrap_or(&anchor), ticket.edge);
        }

        self.release(Edge::Older, ticket.seq);
        self.release(Edge::Newer, ticket.seq);
        if ticket.initial && collection.is_empty() {
            self.newer.state = EdgeState::Exhausted;
            self.older.state = EdgeState::Exhausted;
        }
        self.settle(collection);

        let exhausted = self.state(ticket.edge) == EdgeState::Exhausted;
        debug!(
            edge = %ticket.edge,
            initial = ticket.initial,
            received,
            inserted = batch.inserted,
            exhausted,
            "backfill.complete"
        );
        Some(BackfillOutcome {
            edge: ticket.edge,
            initial: ticket.initial,
            received,
            inserted: batch.inserted,
            exhausted,
            eviction: batch.eviction,
        })
    }

    /// Returns the edges of a failed ticket to `Idle`. Hole flags are left
    /// untouched. Returns whether the ticket still owned its edge.
    pub fn fail<T, P: Policy<T>>(&mut self, collection: &Collection<T, P>, ticket: &Ticket) -> bool {
        if !self.owns(ticket) {
            return false;
        }
        self.release(Edge::Older, ticket.seq);
        self.release(Edge::Newer, ticket.seq);
        self.settle(collection);
        true
    }

    /// Re-derives the state of every edge that is not loading from its
    /// boundary slot.
    pub fn settle<T, P: Policy<T>>(&mut self, collection: &Collection<T, P>) {
        for edge in [Edge::Newer, Edge::Older] {
            if self.state(edge) == EdgeState::Loading || collection.is_empty() {
                continue;
            }
            let state = if collection.has_hole(&Anchor::Boundary, edge) {
                EdgeState::Idle
            } else {
                EdgeState::Exhausted
            };
            let slot = self.edge_mut(edge);
            if slot.state != state {
                debug!(edge = %edge, from = ?slot.state, to = ?state, "backfill.settle");
                slot.state = state;
            }
        }
    }

    /// Forgets every edge state and in-flight ticket.
    pub fn reset(&mut self) {
        self.newer = EdgeSlot::default();
        self.older = EdgeSlot::default();
    }

    fn issue(
        &mut self,
        edge: Edge,
        anchor: Option<String>,
        boundary: bool,
        initial: bool,
        limiter: IdLimiter,
    ) -> Ticket {
        let seq = self.next_seq;
        self.next_seq += 1;
        Ticket {
            seq,
            edge,
            anchor,
            boundary,
            initial,
            limiter,
        }
    }

    fn owns(&self, ticket: &Ticket) -> bool {
        let owned = |edge: Edge| self.edge(edge).ticket == Some(ticket.seq);
        if ticket.initial {
            owned(Edge::Newer) && owned(Edge::Older)
        } else {
            owned(ticket.edge)
        }
    }

    fn occupy(&mut self, edge: Edge, seq: u64) {
        let slot = self.edge_mut(edge);
        slot.state = EdgeState::Loading;
        slot.ticket = Some(seq);
    }

    fn release(&mut self, edge: Edge, seq: u64) {
        let slot = self.edge_mut(edge);
        if slot.ticket == Some(seq) {
            slot.state = EdgeState::Idle;
            slot.ticket = None;
        }
    }

    fn edge(&self, edge: Edge) -> &EdgeSlot {
        match edge {
            Edge::Newer => &self.newer,
            Edge::Older => &self.older,
        }
    }

    fn edge_mut(&mut self, edge: Edge) -> &mut EdgeSlot {
        match edge {
            Edge::Newer => &mut self.newer,
            Edge::Older => &mut self.older,
        }
    }
}
