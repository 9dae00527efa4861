//! Mastodon entities held by the screen feeds.
//!
//! Only the fields the feeds need are decoded; unknown fields are ignored.

use serde::{Deserialize, Serialize};

use crate::ordering::Identified;

/// An account, as embedded in statuses and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Server-assigned id.
    pub id: String,
    /// `user` or `user@domain`.
    pub acct: String,
    /// Handle without domain.
    #[serde(default)]
    pub username: String,
    /// Display name, possibly empty.
    #[serde(default)]
    pub display_name: String,
    /// Profile page.
    #[serde(default)]
    pub url: Option<String>,
    /// Avatar image.
    #[serde(default)]
    pub avatar: Option<String>,
}

/// A status (toot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Server-assigned snowflake id.
    pub id: String,
    /// ISO 8601 creation time.
    #[serde(default)]
    pub created_at: String,
    /// Author.
    pub account: Account,
    /// HTML body.
    #[serde(default)]
    pub content: String,
    /// Content warning.
    #[serde(default)]
    pub spoiler_text: String,
    /// Public page of the status.
    #[serde(default)]
    pub url: Option<String>,
    /// `public`, `unlisted`, `private` or `direct`.
    #[serde(default)]
    pub visibility: Option<String>,
    /// Id of the status this replies to.
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    /// The boosted status, for reblogs.
    #[serde(default)]
    pub reblog: Option<Box<Status>>,
    /// Boost count.
    #[serde(default)]
    pub reblogs_count: u64,
    /// Favourite count.
    #[serde(default)]
    pub favourites_count: u64,
}

/// Kind of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Someone mentioned the user.
    Mention,
    /// Someone boosted a status of the user.
    Reblog,
    /// Someone favourited a status of the user.
    Favourite,
    /// Someone followed the user.
    Follow,
    /// Any kind this crate does not know.
    #[serde(other)]
    Other,
}

/// A notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Server-assigned snowflake id, independent of status ids.
    pub id: String,
    /// What happened.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// ISO 8601 creation time.
    #[serde(default)]
    pub created_at: String,
    /// Who triggered it.
    pub account: Account,
    /// Status concerned, for mentions, reblogs and favourites.
    #[serde(default)]
    pub status: Option<Status>,
}

impl Identified for Status {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Notification {
    fn id(&self) -> &str {
        &self.id
    }
}
