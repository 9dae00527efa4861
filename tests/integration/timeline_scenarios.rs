mod common;

use common::{init_tracing, status, status_with, statuses};
use remotelist::{
    Anchor, Edge, EdgeState, FeedConfig, IdLimiter, LoadError, NewestFirst, Status, Timeline,
};

fn timeline(max: Option<usize>, page_size: usize) -> Timeline<Status> {
    init_tracing();
    Timeline::new("home", &FeedConfig { max, page_size }, NewestFirst)
}

fn ids(feed: &Timeline<Status>) -> Vec<String> {
    feed.collection().iter().map(|slot| slot.id().to_string()).collect()
}

fn fill(feed: &mut Timeline<Status>, anchor: Anchor, edge: Edge, ids: impl IntoIterator<Item = u32>) {
    let ticket = feed.begin_backfill(&anchor, edge).unwrap();
    feed.finish_backfill(ticket, Ok(statuses(ids))).unwrap();
}

#[test]
fn stream_loss_is_recovered_through_the_newer_edge() {
    let mut feed = timeline(None, 3);
    fill(&mut feed, Anchor::Boundary, Edge::Older, [10, 9, 8]);
    assert_eq!(feed.edge_state(Edge::Newer), EdgeState::Exhausted);

    feed.stream_lost();
    assert!(feed.collection().has_hole(&Anchor::Boundary, Edge::Newer));
    assert_eq!(feed.edge_state(Edge::Newer), EdgeState::Idle);

    let ticket = feed.begin_backfill(&Anchor::Boundary, Edge::Newer).unwrap();
    assert_eq!(
        ticket.limiter(),
        &IdLimiter {
            max_id: None,
            since_id: Some("10".into()),
            limit: Some(3),
        }
    );
    let outcome = feed
        .finish_backfill(ticket, Ok(statuses([13, 12, 11])))
        .unwrap()
        .unwrap();
    assert!(!outcome.exhausted);
    assert!(!feed.collection().find_by_id("10").unwrap().hole(Edge::Newer));
    assert!(feed.collection().newest().unwrap().hole(Edge::Newer));
    assert_eq!(feed.edge_state(Edge::Newer), EdgeState::Idle);

    fill(&mut feed, Anchor::Boundary, Edge::Newer, [14]);
    assert_eq!(feed.edge_state(Edge::Newer), EdgeState::Exhausted);
    assert!(!feed.collection().has_hole(&Anchor::Boundary, Edge::Newer));
    assert_eq!(ids(&feed), ["14", "13", "12", "11", "10", "9", "8"]);
    assert_eq!(feed.check_invariants(), Ok(()));
}

#[test]
fn eviction_keeps_both_edges_reachable() {
    let mut feed = timeline(Some(4), 3);
    fill(&mut feed, Anchor::Boundary, Edge::Older, [10, 9, 8]);

    let ticket = feed.begin_backfill(&Anchor::Boundary, Edge::Older).unwrap();
    assert_eq!(ticket.limiter().max_id.as_deref(), Some("8"));
    let outcome = feed
        .finish_backfill(ticket, Ok(statuses([7, 6, 5])))
        .unwrap()
        .unwrap();
    let eviction = outcome.eviction.unwrap();
    assert_eq!(eviction.edge, Edge::Newer);
    assert_eq!(eviction.removed, ["10", "9"]);
    assert_eq!(ids(&feed), ["8", "7", "6", "5"]);
    assert!(feed.collection().newest().unwrap().hole(Edge::Newer));
    assert!(feed.collection().oldest().unwrap().hole(Edge::Older));
    assert_eq!(feed.edge_state(Edge::Newer), EdgeState::Idle);
    assert_eq!(feed.edge_state(Edge::Older), EdgeState::Idle);

    let ticket = feed.begin_backfill(&Anchor::Boundary, Edge::Newer).unwrap();
    assert_eq!(ticket.limiter().since_id.as_deref(), Some("8"));
    feed.finish_backfill(ticket, Ok(statuses([10, 9]))).unwrap();
    assert_eq!(ids(&feed), ["10", "9", "8", "7"]);
    assert_eq!(feed.edge_state(Edge::Newer), EdgeState::Exhausted);
    assert!(feed.collection().oldest().unwrap().hole(Edge::Older));
    assert_eq!(feed.check_invariants(), Ok(()));
}

#[test]
fn interior_gap_is_filled_page_by_page() {
    let mut feed = timeline(None, 3);
    fill(&mut feed, Anchor::Boundary, Edge::Older, [10, 9, 8]);
    feed.stream_lost();
    feed.apply_realtime_insert(status("20"));
    assert!(feed.collection().has_hole(&Anchor::slot("10"), Edge::Newer));

    let ticket = feed.begin_backfill(&Anchor::slot("10"), Edge::Newer).unwrap();
    assert_eq!(ticket.limiter().since_id.as_deref(), Some("10"));
    assert_eq!(ticket.limiter().max_id.as_deref(), Some("20"));
    feed.finish_backfill(ticket, Ok(statuses([13, 12, 11]))).unwrap();
    assert!(!feed.collection().has_hole(&Anchor::slot("10"), Edge::Newer));
    assert!(feed.collection().has_hole(&Anchor::slot("13"), Edge::Newer));

    let ticket = feed.begin_backfill(&Anchor::slot("13"), Edge::Newer).unwrap();
    assert_eq!(ticket.limiter().max_id.as_deref(), Some("20"));
    feed.finish_backfill(ticket, Ok(statuses([15, 14]))).unwrap();
    assert!(!feed.collection().has_hole(&Anchor::slot("15"), Edge::Newer));
    assert_eq!(
        ids(&feed),
        ["20", "15", "14", "13", "12", "11", "10", "9", "8"]
    );
    assert_eq!(feed.edge_state(Edge::Newer), EdgeState::Exhausted);
    assert_eq!(feed.check_invariants(), Ok(()));
}

#[test]
fn tombstones_survive_replacement() {
    let mut feed = timeline(None, 20);
    feed.apply_realtime_insert(status_with("5", "first"));
    assert!(feed.apply_realtime_delete("5"));
    let outcome = feed
        .apply_realtime_insert(status_with("5", "edited"))
        .unwrap();
    assert!(outcome.replaced);
    let slot = feed.collection().find_by_id("5").unwrap();
    assert!(slot.is_deleted());
    assert_eq!(slot.payload().content, "edited");
    assert!(!feed.apply_realtime_delete("6"));
}

#[test]
fn later_payload_wins_for_the_same_id() {
    let mut feed = timeline(None, 3);
    fill(&mut feed, Anchor::Boundary, Edge::Older, [3, 2, 1]);
    feed.apply_realtime_insert(status_with("2", "newer copy"));
    assert_eq!(feed.collection().len(), 3);
    assert_eq!(
        feed.collection().find_by_id("2").unwrap().payload().content,
        "newer copy"
    );
}

#[test]
fn loader_errors_leave_the_feed_retryable() {
    let mut feed = timeline(None, 3);
    fill(&mut feed, Anchor::Boundary, Edge::Older, [10, 9, 8]);
    let ticket = feed.begin_backfill(&Anchor::Boundary, Edge::Older).unwrap();
    let err = feed
        .finish_backfill(
            ticket,
            Err(LoadError::from_response(500, r#"{"error":"busy"}"#)),
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "API error: busy");
    assert_eq!(feed.edge_state(Edge::Older), EdgeState::Idle);
    assert!(feed.begin_backfill(&Anchor::Boundary, Edge::Older).is_ok());
}
