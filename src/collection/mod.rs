//! The ordered, deduplicated, capacity-bounded slot sequence of one feed.
//!
//! Slots are kept in policy order (newest first with the default policy) in a
//! `Vec`, with an id index for lookups. Every slot carries two hole flags,
//! one per side. A gap between two adjacent slots is present when either of
//! the two flags facing it is set, and clearing a gap clears both.

mod slot;


use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::cursor::{Cursors, Page};
use crate::error::InvariantViolation;
use crate::ordering::{NewestFirst, Policy};

pub use slot::{Anchor, Edge, Slot};

/// Slots removed by [`Collection::evict_overflow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eviction {
    /// Edge the slots were removed from.
    pub edge: Edge,
    /// Ids of the removed slots, in collection order.
    pub removed: Vec<String>,
}

/// Result of a single [`Collection::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Id of the inserted or updated slot.
    pub id: String,
    /// Whether an existing slot was updated in place.
    pub replaced: bool,
    /// Side of the collection the item landed on.
    pub side: Edge,
    /// Overflow removed after the insertion.
    pub eviction: Option<Eviction>,
}

/// Result of [`Collection::insert_batch`] and [`Collection::insert_page`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Ids of the batch, in batch order.
    pub ids: Vec<String>,
    /// Items that created a new slot.
    pub inserted: usize,
    /// Items that updated an existing slot.
    pub replaced: usize,
    /// Overflow removed after the batch.
    pub eviction: Option<Eviction>,
}

enum Placement {
    Inserted { id: String, side: Edge },
    Replaced { id: String, side: Edge },
}

/// Ordered bounded collection of slots.
#[derive(Debug, Clone)]
pub struct Collection<T, P = NewestFirst> {
    policy: P,
    max: Option<usize>,
    slots: Vec<Slot<T>>,
    index: FxHashMap<String, usize>,
    last_side: Edge,
}

impl<T, P: Policy<T> + Default> Default for Collection<T, P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<T, P: Policy<T>> Collection<T, P> {
    /// An empty, unbounded collection ordered by `policy`.
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            max: None,
            slots: Vec::new(),
            index: FxHashMap::default(),
            last_side: Edge::Newer,
        }
    }

    /// Sets the capacity.
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// Sets or removes the capacity. Does not evict by itself.
    pub fn set_max(&mut self, max: Option<usize>) {
        self.max = max;
    }

    /// Configured capacity.
    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// The ordering policy.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Number of held slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is held.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots, newer edge first.
    pub fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    /// Iterates the slots, newer edge first.
    pub fn iter(&self) -> std::slice::Iter<'_, Slot<T>> {
        self.slots.iter()
    }

    /// Slot at `index`.
    pub fn get(&self, index: usize) -> Option<&Slot<T>> {
        self.slots.get(index)
    }

    /// Slot on the newer boundary.
    pub fn newest(&self) -> Option<&Slot<T>> {
        self.slots.first()
    }

    /// Slot on the older boundary.
    pub fn oldest(&self) -> Option<&Slot<T>> {
        self.slots.last()
    }

    /// Boundary slot of `edge`.
    pub fn boundary(&self, edge: Edge) -> Option<&Slot<T>> {
        match edge {
            Edge::Newer => self.newest(),
            Edge::Older => self.oldest(),
        }
    }

    /// Position of the slot holding `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// The slot holding `id`. Absence is not an error.
    pub fn find_by_id(&self, id: &str) -> Option<&Slot<T>> {
        self.position(id).map(|pos| &self.slots[pos])
    }

    /// The adjacent slot of `id` on `edge`.
    pub fn neighbor(&self, id: &str, edge: Edge) -> Option<&Slot<T>> {
        let pos = self.position(id)?;
        self.neighbor_index(pos, edge).map(|n| &self.slots[n])
    }

    /// Whether the slot at `anchor` is at the boundary of `edge`.
    pub fn is_boundary(&self, anchor: &Anchor, edge: Edge) -> bool {
        match self.resolve(anchor, edge) {
            Some(pos) => self.neighbor_index(pos, edge).is_none(),
            None => false,
        }
    }

    /// Inserts `item` in policy order, or updates the slot with the same id in
    /// place, then evicts overflow.
    pub fn insert(&mut self, item: T) -> InsertOutcome {
        let (id, replaced, side) = match self.place(item, None) {
            Placement::Inserted { id, side } => {
                self.last_side = side;
                (id, false, side)
            }
            Placement::Replaced { id, side } => (id, true, side),
        };
        let eviction = self.evict_overflow();
        self.debug_validate();
        InsertOutcome {
            id,
            replaced,
            side,
            eviction,
        }
    }

    /// Inserts every item of a batch, then evicts overflow once from the edge
    /// opposite the side most of the batch landed on. A batch filling an empty
    /// collection counts as landing on the newer side.
    pub fn insert_batch<I>(&mut self, items: I) -> BatchOutcome
    where
        I: IntoIterator<Item = T>,
    {
        let mut outcome = BatchOutcome::default();
        let was_empty = self.slots.is_empty();
        let (mut newer, mut older) = (0usize, 0usize);
        for item in items {
            match self.place(item, None) {
                Placement::Inserted { id, side } => {
                    outcome.inserted += 1;
                    match side {
                        Edge::Newer => newer += 1,
                        Edge::Older => older += 1,
                    }
                    outcome.ids.push(id);
                }
                Placement::Replaced { id, .. } => {
                    outcome.replaced += 1;
                    outcome.ids.push(id);
                }
            }
        }
        if outcome.inserted > 0 {
            self.last_side = if was_empty || newer >= older {
                Edge::Newer
            } else {
                Edge::Older
            };
        }
        outcome.eviction = self.evict_overflow();
        self.debug_validate();
        outcome
    }

    /// Inserts a fetched page that extends the collection on `side`. Every
    /// slot of the page records the page cursors.
    pub fn insert_page(&mut self, page: Page<T>, side: Edge) -> BatchOutcome {
        let Page { items, cursors } = page;
        let mut outcome = BatchOutcome::default();
        for item in items {
            match self.place(item, cursors.as_ref()) {
                Placement::Inserted { id, .. } => {
                    outcome.inserted += 1;
                    outcome.ids.push(id);
                }
                Placement::Replaced { id, .. } => {
                    outcome.replaced += 1;
                    outcome.ids.push(id);
                }
            }
        }
        if outcome.inserted > 0 {
            self.last_side = side;
        }
        outcome.eviction = self.evict_overflow();
        self.debug_validate();
        outcome
    }

    /// Removes slots from the edge opposite the latest insertion until the
    /// capacity holds, and marks the new boundary slot as holed toward the
    /// removed items.
    pub fn evict_overflow(&mut self) -> Option<Eviction> {
        let max = self.max?;
        if self.slots.len() <= max {
            return None;
        }
        let edge = self.last_side.opposite();
        let excess = self.slots.len() - max;
        let removed: Vec<Slot<T>> = match edge {
            Edge::Older => self.slots.drain(max..).collect(),
            Edge::Newer => self.slots.drain(..excess).collect(),
        };
        for slot in &removed {
            self.index.remove(&slot.id);
        }
        if edge == Edge::Newer {
            self.reindex_from(0);
        }
        let boundary = match edge {
            Edge::Older => self.slots.last_mut(),
            Edge::Newer => self.slots.first_mut(),
        };
        if let Some(slot) = boundary {
            slot.set_hole(edge, true);
        }
        debug!(edge = %edge, count = removed.len(), "collection.evict");
        Some(Eviction {
            edge,
            removed: removed.into_iter().map(|slot| slot.id).collect(),
        })
    }

    /// Marks a possible gap next to `anchor` on `edge`. Returns whether the
    /// anchor resolved to a slot.
    pub fn mark_hole(&mut self, anchor: &Anchor, edge: Edge) -> bool {
        let Some(pos) = self.resolve(anchor, edge) else {
            return false;
        };
        self.slots[pos].set_hole(edge, true);
        trace!(id = %self.slots[pos].id, edge = %edge, "collection.mark_hole");
        true
    }

    /// Clears the gap next to `anchor` on `edge`, including the flag of the
    /// neighbor facing it. Returns whether the anchor resolved to a slot.
    pub fn clear_hole(&mut self, anchor: &Anchor, edge: Edge) -> bool {
        let Some(pos) = self.resolve(anchor, edge) else {
            return false;
        };
        self.slots[pos].set_hole(edge, false);
        if let Some(neighbor) = self.neighbor_index(pos, edge) {
            self.slots[neighbor].set_hole(edge.opposite(), false);
        }
        trace!(id = %self.slots[pos].id, edge = %edge, "collection.clear_hole");
        true
    }

    /// Whether a gap is known next to `anchor` on `edge`.
    pub fn has_hole(&self, anchor: &Anchor, edge: Edge) -> bool {
        let Some(pos) = self.resolve(anchor, edge) else {
            return false;
        };
        self.slots[pos].hole(edge)
            || self
                .neighbor_index(pos, edge)
                .is_some_and(|neighbor| self.slots[neighbor].hole(edge.opposite()))
    }

    /// Flags the slot holding `id` as deleted upstream. Returns whether the id
    /// is held; unknown ids are ignored.
    pub fn mark_deleted(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.slots[pos].deleted = true;
                true
            }
            None => false,
        }
    }

    /// Drops every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.last_side = Edge::Newer;
    }

    /// Checks ordering, uniqueness, index and capacity invariants.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (index, pair) in self.slots.windows(2).enumerate() {
            if self.policy.compare(&pair[0].payload, &pair[1].payload) == Ordering::Greater {
                return Err(InvariantViolation::Order { index });
            }
        }
        let mut seen = FxHashSet::default();
        for (pos, slot) in self.slots.iter().enumerate() {
            if !seen.insert(slot.id.as_str()) {
                return Err(InvariantViolation::Duplicate(slot.id.clone()));
            }
            if self.index.get(&slot.id) != Some(&pos) {
                return Err(InvariantViolation::StaleIndex(slot.id.clone()));
            }
        }
        if let Some(stale) = self
            .index
            .iter()
            .find(|(id, pos)| self.slots.get(**pos).map(|slot| &slot.id) != Some(*id))
        {
            return Err(InvariantViolation::StaleIndex(stale.0.clone()));
        }
        if let Some(max) = self.max {
            if self.slots.len() > max {
                return Err(InvariantViolation::Capacity {
                    len: self.slots.len(),
                    max,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn slot_mut(&mut self, id: &str) -> Option<&mut Slot<T>> {
        let pos = self.position(id)?;
        self.slots.get_mut(pos)
    }

    fn place(&mut self, item: T, cursors: Option<&Cursors>) -> Placement {
        let id = self.policy.identify(&item);
        if let Some(&pos) = self.index.get(&id) {
            let side = self.side_of(pos, self.slots.len());
            let slot = &mut self.slots[pos];
            slot.payload = item;
            if let Some(cursors) = cursors {
                slot.cursors = Some(cursors.clone());
            }
            trace!(id = %id, pos, "collection.replace");
            return Placement::Replaced { id, side };
        }

        let policy = &self.policy;
        let pos = self
            .slots
            .partition_point(|slot| policy.compare(&slot.payload, &item) != Ordering::Greater);
        let in_gap = self.gap_at(pos);
        let mut slot = Slot::new(id.clone(), item);
        slot.cursors = cursors.cloned();
        slot.hole_newer = in_gap;
        slot.hole_older = in_gap;
        self.slots.insert(pos, slot);
        self.reindex_from(pos);
        let side = self.side_of(pos, self.slots.len());
        trace!(id = %id, pos, side = %side, "collection.insert");
        Placement::Inserted { id, side }
    }

    /// Whether the insertion point `pos` lies inside a known gap.
    fn gap_at(&self, pos: usize) -> bool {
        let len = self.slots.len();
        if len == 0 {
            return false;
        }
        if pos == 0 {
            return self.slots[0].hole_newer;
        }
        if pos == len {
            return self.slots[len - 1].hole_older;
        }
        self.slots[pos - 1].hole_older || self.slots[pos].hole_newer
    }

    fn side_of(&self, pos: usize, len: usize) -> Edge {
        if pos * 2 < len {
            Edge::Newer
        } else {
            Edge::Older
        }
    }

    fn resolve(&self, anchor: &Anchor, edge: Edge) -> Option<usize> {
        match anchor {
            Anchor::Slot(id) => self.position(id),
            Anchor::Boundary => match edge {
                Edge::Newer => (!self.slots.is_empty()).then_some(0),
                Edge::Older => self.slots.len().checked_sub(1),
            },
        }
    }

    fn neighbor_index(&self, pos: usize, edge: Edge) -> Option<usize> {
        match edge {
            Edge::Newer => pos.checked_sub(1),
            Edge::Older => (pos + 1 < self.slots.len()).then_some(pos + 1),
        }
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, slot) in self.slots[start..].iter().enumerate() {
            self.index.insert(slot.id.clone(), start + offset);
        }
    }

    fn debug_validate(&self) {
        debug_assert_eq!(self.check_invariants(), Ok(()));
    }
}

impl<'a, T, P> IntoIterator for &'a Collection<T, P> {
    type Item = &'a Slot<T>;
    type IntoIter = std::slice::Iter<'a, Slot<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.iter()
    }
}
