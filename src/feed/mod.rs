//! A feed: one collection, its backfill coordinator and its liveness.
//!
//! [`Timeline`] is the synchronous single owner; [`FeedHandle`] runs a
//! timeline inside a tokio task and serializes every mutation through its
//! command queue.

mod actor;

use tracing::{debug, info, warn};

use crate::backfill::{BackfillOutcome, Coordinator, EdgeState, Skip, Ticket};
use crate::collection::{Anchor, Collection, Edge, InsertOutcome, Slot};
use crate::config::FeedConfig;
use crate::cursor::Page;
use crate::error::{InvariantViolation, LoadError};
use crate::ordering::{NewestFirst, Policy};

pub use actor::{Backfill, FeedHandle, Loader};

/// Point-in-time copy of a feed, published to readers after each change.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    /// Increases with every change to the feed.
    pub version: u64,
    /// Slots in collection order.
    pub slots: Vec<Slot<T>>,
    /// State of the newer edge.
    pub newer: EdgeState,
    /// State of the older edge.
    pub older: EdgeState,
    /// Whether the feed is still attached.
    pub alive: bool,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            version: 0,
            slots: Vec::new(),
            newer: EdgeState::Idle,
            older: EdgeState::Idle,
            alive: true,
        }
    }
}

impl<T> Snapshot<T> {
    /// Ids in collection order.
    pub fn ids(&self) -> Vec<&str> {
        self.slots.iter().map(Slot::id).collect()
    }

    /// Number of held slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is held.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot holding `id`.
    pub fn get(&self, id: &str) -> Option<&Slot<T>> {
        self.slots.iter().find(|slot| slot.id() == id)
    }

    /// State of `edge`.
    pub fn edge(&self, edge: Edge) -> EdgeState {
        match edge {
            Edge::Newer => self.newer,
            Edge::Older => self.older,
        }
    }
}

/// Single owner of one feed.
#[derive(Debug)]
pub struct Timeline<T, P = NewestFirst> {
    name: String,
    collection: Collection<T, P>,
    coordinator: Coordinator,
    alive: bool,
    version: u64,
}

impl<T, P: Policy<T>> Timeline<T, P> {
    /// An empty, attached feed.
    pub fn new(name: impl Into<String>, config: &FeedConfig, policy: P) -> Self {
        let mut collection = Collection::new(policy);
        collection.set_max(config.max);
        Self {
            name: name.into(),
            collection,
            coordinator: Coordinator::new(config.page_size),
            alive: true,
            version: 0,
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The held collection.
    pub fn collection(&self) -> &Collection<T, P> {
        &self.collection
    }

    /// Current state of `edge`.
    pub fn edge_state(&self, edge: Edge) -> EdgeState {
        self.coordinator.state(edge)
    }

    /// Whether the feed is still attached.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Bumped on every change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Plans a backfill for `edge` at `anchor`.
    pub fn begin_backfill(&mut self, anchor: &Anchor, edge: Edge) -> Result<Ticket, Skip> {
        if !self.alive {
            return Err(Skip::Detached);
        }
        let ticket = self.coordinator.plan(&self.collection, anchor, edge)?;
        self.touch();
        debug!(
            feed = %self.name,
            edge = %ticket.edge(),
            initial = ticket.is_initial(),
            "feed.backfill.start"
        );
        Ok(ticket)
    }

    /// Applies the result of a load. `Ok(None)` means the result was
    /// discarded because the feed was detached or the ticket went stale.
    pub fn finish_backfill(
        &mut self,
        ticket: Ticket,
        result: Result<Page<T>, LoadError>,
    ) -> Result<Option<BackfillOutcome>, LoadError> {
        if !self.alive {
            debug!(feed = %self.name, edge = %ticket.edge(), "feed.backfill.discarded");
            return Ok(None);
        }
        match result {
            Ok(page) => {
                let outcome = self
                    .coordinator
                    .complete(&mut self.collection, ticket, page);
                self.touch();
                Ok(outcome)
            }
            Err(err) => {
                warn!(feed = %self.name, edge = %ticket.edge(), error = %err, "feed.backfill.failed");
                self.coordinator.fail(&self.collection, &ticket);
                self.touch();
                Err(err)
            }
        }
    }

    /// Inserts an item delivered by the stream. Returns `None` when detached.
    ///
    /// A new item landing at the newer boundary is the present, so its newer
    /// hole is cleared. A replaced slot keeps its flags. The first item of an
    /// empty feed is holed toward the past.
    pub fn apply_realtime_insert(&mut self, item: T) -> Option<InsertOutcome> {
        if !self.alive {
            debug!(feed = %self.name, "feed.realtime.refused");
            return None;
        }
        let was_empty = self.collection.is_empty();
        let outcome = self.collection.insert(item);
        if was_empty {
            self.collection.mark_hole(&Anchor::Boundary, Edge::Older);
        }
        if !outcome.replaced && self.collection.position(&outcome.id) == Some(0) {
            if let Some(slot) = self.collection.slot_mut(&outcome.id) {
                slot.set_hole(Edge::Newer, false);
            }
        }
        self.coordinator.settle(&self.collection);
        self.touch();
        debug!(feed = %self.name, id = %outcome.id, replaced = outcome.replaced, "feed.realtime.insert");
        Some(outcome)
    }

    /// Tombstones `id`. Unknown ids are ignored.
    pub fn apply_realtime_delete(&mut self, id: &str) -> bool {
        if !self.alive {
            return false;
        }
        let found = self.collection.mark_deleted(id);
        if found {
            self.touch();
        } else {
            debug!(feed = %self.name, id, "feed.realtime.delete.unknown");
        }
        found
    }

    /// The stream dropped: the present may have moved on without us.
    pub fn stream_lost(&mut self) {
        if !self.alive {
            return;
        }
        self.collection.mark_hole(&Anchor::Boundary, Edge::Newer);
        self.coordinator.settle(&self.collection);
        self.touch();
        info!(feed = %self.name, "realtime.stream_lost");
    }

    /// Marks a possible gap by hand, e.g. to offer a refresh without a
    /// stream.
    pub fn mark_hole(&mut self, anchor: &Anchor, edge: Edge) -> bool {
        if !self.alive {
            return false;
        }
        let marked = self.collection.mark_hole(anchor, edge);
        if marked {
            self.coordinator.settle(&self.collection);
            self.touch();
        }
        marked
    }

    /// Detaches the feed: drops every slot and refuses further mutation.
    pub fn detach(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.collection.clear();
        self.coordinator.reset();
        self.touch();
        info!(feed = %self.name, "feed.detach");
    }

    /// Checks the collection invariants and that every open boundary is
    /// holed.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.collection.check_invariants()?;
        if self.collection.is_empty() {
            return Ok(());
        }
        for edge in [Edge::Newer, Edge::Older] {
            if self.coordinator.state(edge) == EdgeState::Idle
                && !self.collection.has_hole(&Anchor::Boundary, edge)
            {
                return Err(InvariantViolation::OpenBoundary { edge });
            }
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.version += 1;
    }
}

impl<T: Clone, P: Policy<T>> Timeline<T, P> {
    /// Copies the current state for readers.
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            version: self.version,
            slots: self.collection.slots().to_vec(),
            newer: self.coordinator.state(Edge::Newer),
            older: self.coordinator.state(Edge::Older),
            alive: self.alive,
        }
    }
}
