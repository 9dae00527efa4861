//! The home and notification feeds of one signed-in account.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::collection::{Anchor, Edge};
use crate::config::ScreenConfig;
use crate::error::FeedError;
use crate::feed::{Backfill, FeedHandle, Loader, Timeline};
use crate::model::{Notification, NotificationKind, Status};
use crate::ordering::NewestFirst;
use crate::realtime::{RawEvent, RealtimeMerge};

/// Owns both feeds of a screen and the stream pump feeding them.
///
/// Dropping the screen detaches it.
#[derive(Debug)]
pub struct Screen {
    home: FeedHandle<Status>,
    notifications: FeedHandle<Notification>,
    exclude_types: Vec<NotificationKind>,
    pump: Option<JoinHandle<()>>,
    attached: bool,
}

impl Screen {
    /// Spawns both feeds. Must be called inside a tokio runtime.
    pub fn new<H, N>(config: &ScreenConfig, home_loader: H, notification_loader: N) -> Self
    where
        H: Loader<Status>,
        N: Loader<Notification>,
    {
        let home = FeedHandle::spawn(Timeline::new("home", &config.home, NewestFirst), home_loader);
        let notifications = FeedHandle::spawn(
            Timeline::new("notifications", &config.notifications, NewestFirst),
            notification_loader,
        );
        info!("screen.attach");
        Self {
            home,
            notifications,
            exclude_types: config.exclude_types.clone(),
            pump: None,
            attached: true,
        }
    }

    /// The home feed.
    pub fn home(&self) -> &FeedHandle<Status> {
        &self.home
    }

    /// The notification feed.
    pub fn notifications(&self) -> &FeedHandle<Notification> {
        &self.notifications
    }

    /// Whether the screen is still attached.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Starts routing `events` into the feeds, replacing any previous stream.
    /// The end of the stream counts as losing it.
    pub fn attach_stream(&mut self, mut events: mpsc::Receiver<RawEvent>) {
        if !self.attached {
            return;
        }
        self.stop_pump();
        let mut merge = RealtimeMerge::new(
            self.home.clone(),
            self.notifications.clone(),
            self.exclude_types.clone(),
        );
        self.pump = Some(tokio::spawn(async move {
            while let Some(raw) = events.recv().await {
                // Malformed payloads are logged by the merge and skipped.
                let _ = merge.handle_raw(&raw);
            }
            info!("realtime.stream.closed");
            merge.stream_lost();
        }));
    }

    /// Triggers the first load of both feeds and waits for both.
    pub async fn load_initial(&self) -> (Result<Backfill, FeedError>, Result<Backfill, FeedError>) {
        tokio::join!(
            self.home.backfill(Anchor::Boundary, Edge::Older),
            self.notifications.backfill(Anchor::Boundary, Edge::Older),
        )
    }

    /// Stops the stream pump and detaches both feeds.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        self.stop_pump();
        // A feed whose task is already gone has nothing left to detach.
        let _ = self.home.detach();
        let _ = self.notifications.detach();
        info!("screen.detach");
    }

    /// Tears the screen down before signing in as someone else.
    pub fn switch_account(mut self) {
        self.detach();
    }

    fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.detach();
    }
}
