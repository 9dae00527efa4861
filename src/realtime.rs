//! Streaming events and their merge into the screen feeds.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::feed::{FeedHandle, Timeline};
use crate::model::{Notification, NotificationKind, Status};
use crate::ordering::Policy;

/// A server-sent event as read off the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event name.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: String,
}

impl RawEvent {
    /// An event named `event` carrying `data`.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A new or edited status for the home feed.
    Update(Box<Status>),
    /// A new notification.
    Notification(Box<Notification>),
    /// A status was deleted.
    Delete(String),
    /// The connection was established.
    Open,
    /// The connection dropped.
    Error,
}

impl StreamEvent {
    /// Decodes a raw event. Unknown event names yield `None`.
    pub fn decode(raw: &RawEvent) -> Result<Option<Self>, StreamError> {
        let payload = |source| StreamError::Payload {
            event: raw.event.clone(),
            source,
        };
        let event = match raw.event.as_str() {
            "update" | "status.update" => {
                StreamEvent::Update(serde_json::from_str(&raw.data).map_err(payload)?)
            }
            "notification" => {
                StreamEvent::Notification(serde_json::from_str(&raw.data).map_err(payload)?)
            }
            "delete" => {
                let data = raw.data.trim();
                let id = if data.starts_with('"') {
                    serde_json::from_str(data).map_err(payload)?
                } else {
                    data.to_string()
                };
                StreamEvent::Delete(id)
            }
            "open" => StreamEvent::Open,
            "error" => StreamEvent::Error,
            other => {
                debug!(event = other, "realtime.event.ignored");
                return Ok(None);
            }
        };
        Ok(Some(event))
    }
}

/// Something stream events can be applied to.
pub trait RealtimeSink<T> {
    /// Merges an item.
    fn insert(&mut self, item: T);
    /// Tombstones `id` if held.
    fn delete(&mut self, id: &str);
    /// Marks the newer boundary as holed.
    fn stream_lost(&mut self);
}

impl<T, P: Policy<T>> RealtimeSink<T> for Timeline<T, P> {
    fn insert(&mut self, item: T) {
        self.apply_realtime_insert(item);
    }

    fn delete(&mut self, id: &str) {
        self.apply_realtime_delete(id);
    }

    fn stream_lost(&mut self) {
        Timeline::stream_lost(self);
    }
}

impl<T: Clone + Send + Sync + 'static> RealtimeSink<T> for FeedHandle<T> {
    fn insert(&mut self, item: T) {
        if FeedHandle::insert(self, item).is_err() {
            debug!(feed = %self.name(), "realtime.sink.closed");
        }
    }

    fn delete(&mut self, id: &str) {
        if FeedHandle::delete(self, id).is_err() {
            debug!(feed = %self.name(), "realtime.sink.closed");
        }
    }

    fn stream_lost(&mut self) {
        if FeedHandle::stream_lost(self).is_err() {
            debug!(feed = %self.name(), "realtime.sink.closed");
        }
    }
}

/// Routes stream events to the home and notification feeds.
#[derive(Debug)]
pub struct RealtimeMerge<H, N> {
    home: H,
    notifications: N,
    exclude: Vec<NotificationKind>,
}

impl<H, N> RealtimeMerge<H, N>
where
    H: RealtimeSink<Status>,
    N: RealtimeSink<Notification>,
{
    /// Drops notifications whose kind is in `exclude`.
    pub fn new(home: H, notifications: N, exclude: Vec<NotificationKind>) -> Self {
        Self {
            home,
            notifications,
            exclude,
        }
    }

    /// The home sink.
    pub fn home(&self) -> &H {
        &self.home
    }

    /// The notification sink.
    pub fn notifications(&self) -> &N {
        &self.notifications
    }

    /// Applies one decoded event.
    pub fn dispatch(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Update(status) => self.home.insert(*status),
            StreamEvent::Notification(notification) => {
                if self.exclude.contains(&notification.kind) {
                    debug!(id = %notification.id, kind = ?notification.kind, "realtime.notification.excluded");
                } else {
                    self.notifications.insert(*notification);
                }
            }
            // Carries a status id; notification ids live in their own space.
            StreamEvent::Delete(id) => self.home.delete(&id),
            StreamEvent::Open => info!("realtime.stream.open"),
            StreamEvent::Error => self.stream_lost(),
        }
    }

    /// Decodes and applies a raw event. A malformed payload changes nothing.
    pub fn handle_raw(&mut self, raw: &RawEvent) -> Result<(), StreamError> {
        match StreamEvent::decode(raw) {
            Ok(Some(event)) => {
                self.dispatch(event);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                warn!(event = %raw.event, error = %err, "realtime.payload.invalid");
                Err(err)
            }
        }
    }

    /// Marks the newer boundary of both feeds as holed.
    pub fn stream_lost(&mut self) {
        info!("realtime.stream_lost");
        self.home.stream_lost();
        self.notifications.stream_lost();
    }
}
