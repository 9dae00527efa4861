//! Pagination cursors derived from `Link` headers, and the request limiter.
//!
//! Mastodon paginates with `max_id` (older) and `since_id` (newer) query
//! parameters and advertises both in the `Link` response header. The codec
//! here checks that the advertised links stay on the requested endpoint and
//! reduces them to a pair of ids.

mod link;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::MalformedCursorError;

/// Page boundary ids taken from a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursors {
    /// `max_id` to request for moving into the past. `None` means unknown,
    /// never "no older items".
    pub older: Option<String>,
    /// `since_id` to request for moving toward the present.
    pub newer: String,
}

/// Id window of a paginated request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdLimiter {
    /// Only items with an id lower than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_id: Option<String>,
    /// Only items with an id greater than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_id: Option<String>,
    /// Maximum number of items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl IdLimiter {
    /// A limiter carrying only a page size.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Key/value pairs in request order; unset fields are skipped.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(3);
        if let Some(max_id) = &self.max_id {
            pairs.push(("max_id", max_id.clone()));
        }
        if let Some(since_id) = &self.since_id {
            pairs.push(("since_id", since_id.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }

    /// `?max_id=..&since_id=..&limit=..`, or an empty string when nothing is set.
    pub fn to_query_string(&self) -> String {
        let pairs = self.query_pairs();
        if pairs.is_empty() {
            return String::new();
        }
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        format!("?{encoded}")
    }

    /// Appends the limiter to the query of `url`.
    pub fn apply(&self, url: &mut Url) {
        let pairs = self.query_pairs();
        if pairs.is_empty() {
            return;
        }
        url.query_pairs_mut().extend_pairs(pairs);
    }
}

/// One fetched batch, newest first as the server returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// The fetched items.
    pub items: Vec<T>,
    /// Cursors of the batch, when the response carried a `Link` header.
    pub cursors: Option<Cursors>,
}

impl<T> Page<T> {
    /// A page without pagination hints.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursors: None,
        }
    }

    /// Attaches cursors to the page.
    pub fn with_cursors(mut self, cursors: Cursors) -> Self {
        self.cursors = Some(cursors);
        self
    }

    /// Number of items in the page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the page holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Derives `{older, newer}` from the `Link` header of a response to `request`.
pub fn link_to_cursors(request: &Url, link: &str) -> Result<Cursors, MalformedCursorError> {
    let entries = link::parse(link)?;
    let resolve = |uri: &str| {
        request
            .join(uri)
            .map_err(|err| MalformedCursorError::InvalidUrl(format!("{uri}: {err}")))
    };

    let next = match entries.iter().find(|entry| entry.has_rel("next")) {
        Some(entry) => Some(resolve(&entry.uri)?),
        None => None,
    };
    let prev = entries
        .iter()
        .find(|entry| entry.has_rel("prev") || entry.has_rel("previous"))
        .ok_or(MalformedCursorError::MissingPrev)?;
    let prev = resolve(&prev.uri)?;

    let older = match next {
        Some(next) => {
            if !same_endpoint(request, &next) {
                return Err(MalformedCursorError::ForeignPath { rel: "next" });
            }
            Some(query_param(&next, "max_id").ok_or(MalformedCursorError::MissingParam {
                rel: "next",
                param: "max_id",
            })?)
        }
        None => None,
    };
    if !same_endpoint(request, &prev) {
        return Err(MalformedCursorError::ForeignPath { rel: "prev" });
    }
    let newer = query_param(&prev, "since_id").ok_or(MalformedCursorError::MissingParam {
        rel: "prev",
        param: "since_id",
    })?;

    Ok(Cursors { older, newer })
}

/// Wraps a fetched batch into a [`Page`], deriving cursors when a `Link`
/// header is present.
pub fn annotate<T>(
    request: &Url,
    link: Option<&str>,
    items: Vec<T>,
) -> Result<Page<T>, MalformedCursorError> {
    let page = Page::new(items);
    match link {
        Some(link) => Ok(page.with_cursors(link_to_cursors(request, link)?)),
        None => Ok(page),
    }
}

fn same_endpoint(request: &Url, other: &Url) -> bool {
    request.origin() == other.origin() && request.path() == other.path()
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
