#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use remotelist::{Account, IdLimiter, LoadError, Loader, Notification, NotificationKind, Page, Status};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("remotelist=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

pub fn account() -> Account {
    Account {
        id: "1".into(),
        acct: "alice".into(),
        username: "alice".into(),
        display_name: String::new(),
        url: None,
        avatar: None,
    }
}

pub fn status(id: &str) -> Status {
    status_with(id, "")
}

pub fn status_with(id: &str, content: &str) -> Status {
    Status {
        id: id.into(),
        created_at: String::new(),
        account: account(),
        content: content.into(),
        spoiler_text: String::new(),
        url: None,
        visibility: None,
        in_reply_to_id: None,
        reblog: None,
        reblogs_count: 0,
        favourites_count: 0,
    }
}

pub fn notification(id: &str, kind: NotificationKind) -> Notification {
    Notification {
        id: id.into(),
        kind,
        created_at: String::new(),
        account: account(),
        status: None,
    }
}

pub fn status_json(id: &str) -> String {
    serde_json::to_string(&status(id)).unwrap()
}

pub fn notification_json(id: &str, kind: NotificationKind) -> String {
    serde_json::to_string(&notification(id, kind)).unwrap()
}

pub fn statuses(ids: impl IntoIterator<Item = u32>) -> Page<Status> {
    Page::new(ids.into_iter().map(|id| status(&id.to_string())).collect())
}

/// Serves canned pages in order and records every limiter it was called
/// with. Calls can be held until released.
#[derive(Clone)]
pub struct ScriptedLoader<T> {
    pages: Arc<Mutex<Vec<Result<Page<T>, LoadError>>>>,
    calls: Arc<Mutex<Vec<IdLimiter>>>,
    count: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl<T> ScriptedLoader<T> {
    pub fn new(pages: Vec<Result<Page<T>, LoadError>>) -> Self {
        let mut pages = pages;
        pages.reverse();
        Self {
            pages: Arc::new(Mutex::new(pages)),
            calls: Arc::new(Mutex::new(Vec::new())),
            count: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<IdLimiter> {
        self.calls.lock().unwrap().clone()
    }
}

impl<T: Send + 'static> Loader<T> for ScriptedLoader<T> {
    async fn load(&self, limiter: IdLimiter) -> Result<Page<T>, LoadError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(limiter);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.pages
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(Page::new(Vec::new())))
    }
}
