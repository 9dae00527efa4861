//! Ordered remote collections for a Mastodon client.
//!
//! A feed keeps the items fetched from a paginated endpoint in one ordered,
//! deduplicated and bounded sequence. Gaps that may hide unfetched items are
//! tracked as holes, so a backfill can request exactly the missing slice.
//! Stream events merge into the same sequence.
//!
//! Layers, leaves first: [`cursor`] and [`ordering`] are pure helpers,
//! [`collection`] holds the slots, [`backfill`] plans and applies page loads,
//! [`feed`] binds both behind a single owner, [`realtime`] routes stream events
//! and [`screen`] owns the feeds of one account.

#![warn(missing_docs)]

pub mod backfill;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod error;
pub mod feed;
pub mod model;
pub mod ordering;
pub mod realtime;
pub mod screen;

pub use backfill::{BackfillOutcome, Coordinator, EdgeState, Skip, Ticket, DEFAULT_PAGE_SIZE};
pub use collection::{Anchor, BatchOutcome, Collection, Edge, Eviction, InsertOutcome, Slot};
pub use config::{ConfigError, FeedConfig, ScreenConfig};
pub use cursor::{annotate, link_to_cursors, Cursors, IdLimiter, Page};
pub use error::{FeedError, InvariantViolation, LoadError, MalformedCursorError, StreamError};
pub use feed::{Backfill, FeedHandle, Loader, Snapshot, Timeline};
pub use model::{Account, Notification, NotificationKind, Status};
pub use ordering::{compare_snowflake, FnPolicy, Identified, NewestFirst, OldestFirst, Policy};
pub use realtime::{RawEvent, RealtimeMerge, RealtimeSink, StreamEvent};
pub use screen::Screen;
