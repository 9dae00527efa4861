use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use super::{Snapshot, Timeline};
use crate::backfill::{BackfillOutcome, Skip, Ticket};
use crate::collection::{Anchor, Edge};
use crate::cursor::{IdLimiter, Page};
use crate::error::{FeedError, LoadError, Result};
use crate::ordering::Policy;

/// Fetches one page of a feed for a request window.
pub trait Loader<T>: Send + Sync + 'static {
    /// Loads the items inside `limiter`, newest first.
    fn load(&self, limiter: IdLimiter) -> impl Future<Output = Result<Page<T>, LoadError>> + Send;
}

impl<T, F, Fut> Loader<T> for F
where
    F: Fn(IdLimiter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>, LoadError>> + Send,
{
    fn load(&self, limiter: IdLimiter) -> impl Future<Output = Result<Page<T>, LoadError>> + Send {
        self(limiter)
    }
}

/// Reply to [`FeedHandle::backfill`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backfill {
    /// The page was applied.
    Completed(BackfillOutcome),
    /// The trigger was ignored; the loader was not called.
    Skipped(Skip),
    /// The page arrived after the feed was detached and was dropped.
    Discarded,
}

type Reply = oneshot::Sender<Result<Backfill>>;

enum Command<T> {
    Backfill {
        anchor: Anchor,
        edge: Edge,
        reply: Reply,
    },
    Insert(T),
    Delete(String),
    StreamLost,
    MarkHole {
        anchor: Anchor,
        edge: Edge,
    },
    Detach,
    Sync(oneshot::Sender<()>),
}

struct Completion<T> {
    ticket: Ticket,
    result: Result<Page<T>, LoadError>,
    reply: Reply,
}

/// Cloneable handle to a feed running in its own task.
///
/// Commands are applied one at a time in the order they were sent. Loads run
/// in spawned tasks and their pages re-enter the same queue, so the feed is
/// never borrowed across an await.
pub struct FeedHandle<T> {
    name: Arc<str>,
    commands: mpsc::UnboundedSender<Command<T>>,
    snapshots: watch::Receiver<Arc<Snapshot<T>>>,
}

impl<T> Clone for FeedHandle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            commands: self.commands.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<T> std::fmt::Debug for FeedHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedHandle")
            .field("name", &self.name)
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl<T> FeedHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Moves `timeline` into a new task that loads pages through `loader`.
    /// Must be called inside a tokio runtime.
    pub fn spawn<P, L>(timeline: Timeline<T, P>, loader: L) -> Self
    where
        P: Policy<T>,
        L: Loader<T>,
    {
        let name: Arc<str> = Arc::from(timeline.name());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(timeline.snapshot()));
        let actor = Actor {
            timeline,
            loader: Arc::new(loader),
            snapshots: snapshot_tx,
            published: 0,
            in_flight: 0,
        };
        tokio::spawn(actor.run(command_rx));
        info!(feed = %name, "feed.attach");
        Self {
            name,
            commands,
            snapshots,
        }
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests more items at `edge` next to `anchor`.
    ///
    /// The command is queued before this returns, so triggers keep the order
    /// they were issued in even when their futures are polled later.
    pub fn backfill(
        &self,
        anchor: Anchor,
        edge: Edge,
    ) -> impl Future<Output = Result<Backfill>> + Send + 'static {
        let (reply, response) = oneshot::channel();
        let sent = self
            .commands
            .send(Command::Backfill {
                anchor,
                edge,
                reply,
            })
            .is_ok();
        async move {
            if !sent {
                return Err(FeedError::Closed);
            }
            response.await.unwrap_or(Err(FeedError::Closed))
        }
    }

    /// Merges an item delivered by the stream.
    pub fn insert(&self, item: T) -> Result<()> {
        self.send(Command::Insert(item))
    }

    /// Tombstones `id` if held.
    pub fn delete(&self, id: impl Into<String>) -> Result<()> {
        self.send(Command::Delete(id.into()))
    }

    /// Reports that the stream dropped.
    pub fn stream_lost(&self) -> Result<()> {
        self.send(Command::StreamLost)
    }

    /// Marks a possible gap at `anchor` on `edge`.
    pub fn mark_hole(&self, anchor: Anchor, edge: Edge) -> Result<()> {
        self.send(Command::MarkHole { anchor, edge })
    }

    /// Detaches the feed. Loads still in flight finish, and their pages are
    /// dropped.
    pub fn detach(&self) -> Result<()> {
        self.send(Command::Detach)
    }

    /// Resolves once every command sent before it has been applied. Loads
    /// still in flight are not waited for.
    pub async fn settled(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.send(Command::Sync(done))?;
        wait.await.map_err(|_| FeedError::Closed)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot<T>>> {
        self.snapshots.clone()
    }

    fn send(&self, command: Command<T>) -> Result<()> {
        self.commands.send(command).map_err(|_| FeedError::Closed)
    }
}

struct Actor<T, P, L> {
    timeline: Timeline<T, P>,
    loader: Arc<L>,
    snapshots: watch::Sender<Arc<Snapshot<T>>>,
    published: u64,
    in_flight: usize,
}

impl<T, P, L> Actor<T, P, L>
where
    T: Clone + Send + Sync + 'static,
    P: Policy<T>,
    L: Loader<T>,
{
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command<T>>) {
        let (completion_tx, mut completions) = mpsc::unbounded_channel::<Completion<T>>();
        let mut open = true;
        loop {
            tokio::select! {
                command = commands.recv(), if open => match command {
                    Some(command) => self.handle(command, &completion_tx),
                    None => open = false,
                },
                Some(done) = completions.recv() => {
                    self.in_flight -= 1;
                    self.complete(done);
                }
            }
            self.publish();
            if !open && self.in_flight == 0 {
                break;
            }
        }
        debug!(feed = %self.timeline.name(), "feed.actor.exit");
    }

    fn handle(&mut self, command: Command<T>, completions: &mpsc::UnboundedSender<Completion<T>>) {
        match command {
            Command::Backfill {
                anchor,
                edge,
                reply,
            } => match self.timeline.begin_backfill(&anchor, edge) {
                Ok(ticket) => self.start_load(ticket, reply, completions),
                Err(Skip::Detached) => {
                    let _ = reply.send(Err(FeedError::Detached));
                }
                Err(skip) => {
                    debug!(feed = %self.timeline.name(), edge = %edge, reason = %skip, "feed.backfill.skip");
                    let _ = reply.send(Ok(Backfill::Skipped(skip)));
                }
            },
            Command::Insert(item) => {
                self.timeline.apply_realtime_insert(item);
            }
            Command::Delete(id) => {
                self.timeline.apply_realtime_delete(&id);
            }
            Command::StreamLost => self.timeline.stream_lost(),
            Command::MarkHole { anchor, edge } => {
                self.timeline.mark_hole(&anchor, edge);
            }
            Command::Detach => self.timeline.detach(),
            Command::Sync(done) => {
                self.publish();
                let _ = done.send(());
            }
        }
    }

    fn start_load(
        &mut self,
        ticket: Ticket,
        reply: Reply,
        completions: &mpsc::UnboundedSender<Completion<T>>,
    ) {
        let loader = Arc::clone(&self.loader);
        let completions = completions.clone();
        let limiter = ticket.limiter().clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let call = tokio::spawn(async move { loader.load(limiter).await });
            let result = match call.await {
                Ok(result) => result,
                Err(err) => Err(LoadError::Transport(format!("loader task failed: {err}"))),
            };
            let _ = completions.send(Completion {
                ticket,
                result,
                reply,
            });
        });
    }

    fn complete(&mut self, done: Completion<T>) {
        let Completion {
            ticket,
            result,
            reply,
        } = done;
        let response = match self.timeline.finish_backfill(ticket, result) {
            Ok(Some(outcome)) => Ok(Backfill::Completed(outcome)),
            Ok(None) => Ok(Backfill::Discarded),
            Err(err) => Err(FeedError::Load(err)),
        };
        self.publish();
        let _ = reply.send(response);
    }

    fn publish(&mut self) {
        let version = self.timeline.version();
        if version == self.published {
            return;
        }
        self.published = version;
        self.snapshots
            .send_replace(Arc::new(self.timeline.snapshot()));
    }
}
