mod common;

use std::sync::Arc;

use common::{init_tracing, status, statuses, ScriptedLoader};
use remotelist::{
    Anchor, Backfill, Edge, EdgeState, FeedConfig, FeedError, FeedHandle, IdLimiter, LoadError,
    NewestFirst, Page, Skip, Status, Timeline,
};
use tokio::sync::Notify;

fn spawn(loader: ScriptedLoader<Status>, page_size: usize) -> FeedHandle<Status> {
    init_tracing();
    let config = FeedConfig {
        max: None,
        page_size,
    };
    FeedHandle::spawn(Timeline::new("home", &config, NewestFirst), loader)
}

#[tokio::test]
async fn second_trigger_on_a_loading_edge_skips_the_loader() {
    let gate = Arc::new(Notify::new());
    let loader = ScriptedLoader::new(vec![Ok(statuses([3, 2, 1]))]).gated(Arc::clone(&gate));
    let feed = spawn(loader.clone(), 3);

    let first = feed.backfill(Anchor::Boundary, Edge::Older);
    let second = feed.backfill(Anchor::Boundary, Edge::Older).await.unwrap();
    assert_eq!(second, Backfill::Skipped(Skip::Loading));

    gate.notify_one();
    let first = first.await.unwrap();
    assert!(matches!(first, Backfill::Completed(outcome) if outcome.inserted == 3));
    assert_eq!(loader.count(), 1);
    assert_eq!(loader.calls(), [IdLimiter::with_limit(3)]);
    assert_eq!(feed.snapshot().ids(), ["3", "2", "1"]);
}

#[tokio::test]
async fn detach_discards_loads_in_flight() {
    let gate = Arc::new(Notify::new());
    let loader = ScriptedLoader::new(vec![Ok(statuses([3, 2, 1]))]).gated(Arc::clone(&gate));
    let feed = spawn(loader, 3);

    let pending = feed.backfill(Anchor::Boundary, Edge::Older);
    feed.detach().unwrap();
    feed.settled().await.unwrap();
    gate.notify_one();

    assert_eq!(pending.await, Ok(Backfill::Discarded));
    let snapshot = feed.snapshot();
    assert!(!snapshot.alive);
    assert!(snapshot.is_empty());
    assert_eq!(
        feed.backfill(Anchor::Boundary, Edge::Older).await,
        Err(FeedError::Detached)
    );
}

#[tokio::test]
async fn loader_failure_reaches_the_caller() {
    let loader = ScriptedLoader::new(vec![
        Ok(statuses([3, 2, 1])),
        Err(LoadError::from_response(404, "Record not found")),
    ]);
    let feed = spawn(loader.clone(), 3);
    feed.backfill(Anchor::Boundary, Edge::Older).await.unwrap();

    let err = feed
        .backfill(Anchor::Boundary, Edge::Older)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Record not found");
    assert_eq!(loader.calls()[1].max_id.as_deref(), Some("1"));
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.older, EdgeState::Idle);
    assert!(snapshot.get("1").unwrap().hole(Edge::Older));
}

#[tokio::test]
async fn exhausted_edge_does_not_call_the_loader_again() {
    let loader = ScriptedLoader::new(vec![Ok(statuses([2, 1]))]);
    let feed = spawn(loader.clone(), 3);
    let first = feed.backfill(Anchor::Boundary, Edge::Older).await.unwrap();
    assert!(matches!(first, Backfill::Completed(outcome) if outcome.exhausted));

    let again = feed.backfill(Anchor::Boundary, Edge::Older).await.unwrap();
    assert_eq!(again, Backfill::Skipped(Skip::Exhausted));
    assert_eq!(loader.count(), 1);
}

#[tokio::test]
async fn closures_are_loaders() {
    init_tracing();
    let loader = |limiter: IdLimiter| async move {
        assert_eq!(limiter.limit, Some(20));
        Ok::<_, LoadError>(Page::new(vec![status("7")]))
    };
    let feed = FeedHandle::spawn(
        Timeline::new("home", &FeedConfig::default(), NewestFirst),
        loader,
    );
    feed.backfill(Anchor::Boundary, Edge::Older).await.unwrap();
    assert_eq!(feed.snapshot().ids(), ["7"]);
}

#[tokio::test]
async fn realtime_commands_apply_in_order() {
    let feed = spawn(ScriptedLoader::new(Vec::new()), 20);
    let mut updates = feed.subscribe();

    feed.insert(status("5")).unwrap();
    feed.insert(status("9")).unwrap();
    feed.delete("5").unwrap();
    feed.delete("404").unwrap();
    feed.settled().await.unwrap();

    updates.changed().await.unwrap();
    let snapshot = updates.borrow_and_update().clone();
    assert_eq!(snapshot.ids(), ["9", "5"]);
    assert!(snapshot.get("5").unwrap().is_deleted());
    assert_eq!(snapshot.newer, EdgeState::Exhausted);
    assert_eq!(snapshot.older, EdgeState::Idle);

    feed.stream_lost().unwrap();
    feed.settled().await.unwrap();
    assert_eq!(feed.snapshot().newer, EdgeState::Idle);
}

#[tokio::test]
async fn manual_hole_offers_a_refresh() {
    let loader = ScriptedLoader::new(vec![Ok(statuses([2, 1])), Ok(statuses([4, 3]))]);
    let feed = spawn(loader.clone(), 3);
    feed.backfill(Anchor::Boundary, Edge::Older).await.unwrap();

    feed.mark_hole(Anchor::Boundary, Edge::Newer).unwrap();
    let refreshed = feed.backfill(Anchor::Boundary, Edge::Newer).await.unwrap();
    assert!(matches!(refreshed, Backfill::Completed(outcome) if outcome.exhausted));
    assert_eq!(loader.calls()[1].since_id.as_deref(), Some("2"));
    assert_eq!(feed.snapshot().ids(), ["4", "3", "2", "1"]);
}
