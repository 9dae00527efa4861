//! Identity and ordering policies for timeline items.
//!
//! Mastodon ids are decimal strings that outgrow 64-bit integers on some
//! servers, so they are never parsed: a longer id is newer, and ids of the
//! same length compare byte-wise.

use std::cmp::Ordering;
use std::fmt;

/// Items that carry a stable, server-assigned id.
pub trait Identified {
    /// Returns the id of this item.
    fn id(&self) -> &str;
}

/// Compares two snowflake-like decimal ids: length first, then lexicographic.
///
/// `"9" < "10" < "99999999999999999999"`.
pub fn compare_snowflake(x: &str, y: &str) -> Ordering {
    x.len()
        .cmp(&y.len())
        .then_with(|| x.as_bytes().cmp(y.as_bytes()))
}

/// Supplies `identify` and `compare` for one feed.
///
/// Both functions must agree with each other: two items with the same id are
/// the same logical entity and must compare [`Ordering::Equal`]. Items are
/// stored so that `compare(a, b) != Ordering::Greater` holds for every
/// adjacent pair `(a, b)`; the first position is the newer edge.
pub trait Policy<T>: Send + Sync + 'static {
    /// Returns the id of `item`. Must stay stable while the item is held.
    fn identify(&self, item: &T) -> String;

    /// Orders two items; `Less` places `a` on the newer side of `b`.
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Newest first, by snowflake id. The default for home and notification feeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewestFirst;

impl<T: Identified> Policy<T> for NewestFirst {
    fn identify(&self, item: &T) -> String {
        item.id().to_owned()
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        compare_snowflake(b.id(), a.id())
    }
}

/// Oldest first, by snowflake id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OldestFirst;

impl<T: Identified> Policy<T> for OldestFirst {
    fn identify(&self, item: &T) -> String {
        item.id().to_owned()
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        compare_snowflake(a.id(), b.id())
    }
}

/// A policy assembled from two closures.
pub struct FnPolicy<I, C> {
    identify: I,
    compare: C,
}

impl<I, C> FnPolicy<I, C> {
    /// Builds a policy from an `identify` and a `compare` function.
    pub fn new(identify: I, compare: C) -> Self {
        Self { identify, compare }
    }
}

impl<I, C> fmt::Debug for FnPolicy<I, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPolicy").finish_non_exhaustive()
    }
}

impl<T, I, C> Policy<T> for FnPolicy<I, C>
where
    I: Fn(&T) -> String + Send + Sync + 'static,
    C: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
{
    fn identify(&self, item: &T) -> String {
        (self.identify)(item)
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.compare)(a, b)
    }
}
