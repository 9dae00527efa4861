mod common;

use common::{init_tracing, notification, notification_json, status_json, statuses, ScriptedLoader};
use remotelist::{
    Backfill, EdgeState, Notification, NotificationKind, Page, RawEvent, Screen, ScreenConfig,
    Status,
};
use tokio::sync::mpsc;

fn screen() -> Screen {
    init_tracing();
    let home = ScriptedLoader::<Status>::new(vec![Ok(statuses([20, 19]))]);
    let notifications = ScriptedLoader::<Notification>::new(vec![Ok(Page::new(vec![notification(
        "2",
        NotificationKind::Mention,
    )]))]);
    Screen::new(&ScreenConfig::default(), home, notifications)
}

#[tokio::test]
async fn stream_events_reach_both_feeds() {
    let mut screen = screen();
    let (home, notes) = screen.load_initial().await;
    assert!(matches!(home, Ok(Backfill::Completed(_))));
    assert!(matches!(notes, Ok(Backfill::Completed(_))));

    let (events, receiver) = mpsc::channel(16);
    screen.attach_stream(receiver);
    for raw in [
        RawEvent::new("open", ""),
        RawEvent::new("update", "{"),
        RawEvent::new("update", status_json("30")),
        RawEvent::new("notification", notification_json("5", NotificationKind::Mention)),
        RawEvent::new("notification", notification_json("6", NotificationKind::Favourite)),
        RawEvent::new("delete", "30"),
    ] {
        events.send(raw).await.unwrap();
    }
    drop(events);

    let mut home = screen.home().subscribe();
    let snapshot = home
        .wait_for(|snapshot| snapshot.newer == EdgeState::Idle)
        .await
        .unwrap()
        .clone();
    assert_eq!(snapshot.ids(), ["30", "20", "19"]);
    assert!(snapshot.get("30").unwrap().is_deleted());

    let mut notes = screen.notifications().subscribe();
    let snapshot = notes
        .wait_for(|snapshot| snapshot.newer == EdgeState::Idle)
        .await
        .unwrap()
        .clone();
    assert_eq!(snapshot.ids(), ["5", "2"]);
}

#[tokio::test]
async fn detach_stops_the_stream_and_clears_the_feeds() {
    let mut screen = screen();
    screen.load_initial().await.0.unwrap();
    let (events, receiver) = mpsc::channel(16);
    screen.attach_stream(receiver);

    let home = screen.home().clone();
    screen.detach();
    assert!(!screen.is_attached());
    let _ = events.send(RawEvent::new("update", status_json("30"))).await;

    let mut updates = home.subscribe();
    let snapshot = updates
        .wait_for(|snapshot| !snapshot.alive)
        .await
        .unwrap()
        .clone();
    assert!(snapshot.is_empty());
    home.settled().await.unwrap();
    assert!(home.snapshot().is_empty());
}

#[tokio::test]
async fn switching_accounts_detaches_everything() {
    let screen = screen();
    let notifications = screen.notifications().clone();
    screen.switch_account();
    let mut updates = notifications.subscribe();
    updates.wait_for(|snapshot| !snapshot.alive).await.unwrap();
}
