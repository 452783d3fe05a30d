mod common;

use argusx::api;
use argusx::app::App;
use argusx::constants::api::LOOKUP_LIMIT;
use argusx::constants::transport::{KEEPALIVE_MS, RECONNECT_MS};
use argusx::router::{self, Route};
use argusx::stats;
use argusx::theme::Theme;
use argusx::transport::{TransportConfig, TransportConnector};
use argusx::types::{AppEvent, ConnectionState};
use argusx::verify::VerifyKind;
use common::{frame, txn, MemoryBackend, ScriptedDialer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

fn ids(app: &App) -> Vec<String> {
    app.visible().iter().map(|t| t.id.clone()).collect()
}

/// Feed events into the app until `n` transactions have been streamed
async fn pump_streamed(app: &mut App, rx: &mut UnboundedReceiver<AppEvent>, n: usize) {
    let mut seen = 0;
    while seen < n {
        let ev = rx.recv().await.expect("event channel closed");
        if matches!(ev, AppEvent::Streamed(_)) {
            seen += 1;
        }
        app.on_event(ev);
    }
}

async fn pump_until_state(app: &mut App, rx: &mut UnboundedReceiver<AppEvent>, want: ConnectionState) {
    while app.connection() != want {
        let ev = rx.recv().await.expect("event channel closed");
        app.on_event(ev);
    }
}

fn connector(dialer: Arc<ScriptedDialer>) -> (TransportConnector, UnboundedReceiver<AppEvent>) {
    let (tx, rx) = unbounded_channel();
    let cfg = TransportConfig {
        url: "ws://test/ws/stream".into(),
        keepalive: Duration::from_millis(KEEPALIVE_MS),
        reconnect_delay: Duration::from_millis(RECONNECT_MS),
    };
    (TransportConnector::new(cfg, dialer, tx), rx)
}

#[tokio::test(start_paused = true)]
async fn streamed_events_drive_feed_and_filters() {
    let dialer = Arc::new(ScriptedDialer::default());
    let server = dialer.serve();
    let (mut conn, mut rx) = connector(dialer.clone());
    let mut app = App::new(Theme::Nord, String::new(), LOOKUP_LIMIT, 3.0, None);

    conn.connect();
    server.push.send(frame("A", 12, "Mumbai", 200)).unwrap();
    server.push.send(frame("B", 91, "Delhi", 900)).unwrap();
    server.push.send(frame("C", 20, "Mumbai", 1500)).unwrap();
    pump_streamed(&mut app, &mut rx, 3).await;

    assert_eq!(app.connection(), ConnectionState::Connected);
    assert_eq!(ids(&app), vec!["C", "B", "A"]);
    assert_eq!(app.selected().unwrap().id, "C", "newest event takes focus");
    assert!(app.alert().is_none());

    app.set_filter("city:Mumbai");
    assert_eq!(ids(&app), vec!["C", "A"]);
    app.set_filter("min:500 max:1000");
    assert_eq!(ids(&app), vec!["B"]);
    assert_eq!(app.selected().unwrap().id, "C", "selection survives being filtered out");

    drop(server);
    pump_until_state(&mut app, &mut rx, ConnectionState::Disconnected).await;
    conn.shutdown().await;
    assert!(!conn.is_running());
}

#[tokio::test(start_paused = true)]
async fn newest_event_shows_even_when_filtered_out() {
    let dialer = Arc::new(ScriptedDialer::default());
    let server = dialer.serve();
    let (mut conn, mut rx) = connector(dialer.clone());
    let mut app = App::new(Theme::Nord, "action:BLOCK".into(), LOOKUP_LIMIT, 3.0, None);

    conn.connect();
    server.push.send(frame("B1", 88, "Delhi", 900)).unwrap();
    server.push.send(frame("N", 5, "Pune", 50)).unwrap();
    pump_streamed(&mut app, &mut rx, 2).await;
    assert_eq!(ids(&app), vec!["N", "B1"]);

    server.push.send(frame("B2", 95, "Delhi", 990)).unwrap();
    pump_streamed(&mut app, &mut rx, 1).await;
    assert_eq!(ids(&app), vec!["B2", "B1"], "override moves to the newest event");
    assert_eq!(app.alert_kind(), Some(VerifyKind::Block));

    conn.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dropped_stream_reconnects_and_keeps_store() {
    let dialer = Arc::new(ScriptedDialer::default());
    let first = dialer.serve();
    let second = dialer.serve();
    let (mut conn, mut rx) = connector(dialer.clone());
    let mut app = App::new(Theme::Nord, String::new(), LOOKUP_LIMIT, 3.0, None);

    conn.connect();
    first.push.send(frame("A", 12, "Mumbai", 200)).unwrap();
    pump_streamed(&mut app, &mut rx, 1).await;

    drop(first);
    pump_until_state(&mut app, &mut rx, ConnectionState::Disconnected).await;
    pump_until_state(&mut app, &mut rx, ConnectionState::Connected).await;
    assert_eq!(*dialer.dials.lock().unwrap(), 2);

    second.push.send(frame("B", 30, "Mumbai", 300)).unwrap();
    pump_streamed(&mut app, &mut rx, 1).await;
    assert_eq!(ids(&app), vec!["B", "A"]);
    conn.shutdown().await;
}

#[tokio::test]
async fn deep_link_resolves_through_backend() {
    let backend = Arc::new(MemoryBackend::with_listing(vec![
        txn("NEW", 10, "Pune", 100),
        txn("OLD", 80, "Pune", 4200),
    ]));
    let (api_tx, api_rx) = unbounded_channel();
    let (ev_tx, mut ev_rx) = unbounded_channel();
    tokio::spawn(api::run_api_worker(backend.clone(), api_rx, ev_tx));
    let mut app = App::new(Theme::Nord, String::new(), LOOKUP_LIMIT, 3.0, Some(api_tx));

    app.navigate_to(router::parse("argusx://item/OLD").unwrap());
    assert_eq!(app.path(), "/item/OLD");
    assert_eq!(app.pending_lookup(), Some("OLD"));
    assert!(app.selected().is_none());

    let ev = ev_rx.recv().await.unwrap();
    app.on_event(ev);
    assert_eq!(app.selected().unwrap().id, "OLD");
    assert_eq!(app.alert_kind(), Some(VerifyKind::Block));
    assert!(!app.store().contains("OLD"), "looked-up rows are not added to the live feed");

    app.back();
    assert_eq!(app.route(), &Route::Feed);
    assert!(app.selected().is_none());
}

#[tokio::test]
async fn unknown_deep_link_clears_selection() {
    let backend = Arc::new(MemoryBackend::default());
    let (api_tx, api_rx) = unbounded_channel();
    let (ev_tx, mut ev_rx) = unbounded_channel();
    tokio::spawn(api::run_api_worker(backend, api_rx, ev_tx));
    let mut app = App::new(Theme::Nord, String::new(), LOOKUP_LIMIT, 3.0, Some(api_tx));

    app.navigate_to(Route::item("NOPE"));
    app.on_event(ev_rx.recv().await.unwrap());
    assert!(app.selected().is_none());
    assert!(app.pending_lookup().is_none());
    assert_eq!(app.toast_message(), Some("Transaction NOPE not found"));
}

#[tokio::test(start_paused = true)]
async fn stats_poller_feeds_counters() {
    let backend = Arc::new(MemoryBackend::with_listing(vec![txn("A", 10, "Pune", 100)]));
    let (tx, mut rx) = unbounded_channel();
    let poller = tokio::spawn(stats::run_stats_poller(backend, 5_000, tx));
    let mut app = App::new(Theme::Nord, String::new(), LOOKUP_LIMIT, 3.0, None);

    app.on_event(rx.recv().await.unwrap());
    assert_eq!(app.stats().unwrap().total, 1);
    assert!(app.stats_at().is_some());

    tokio::time::sleep(Duration::from_millis(5_100)).await;
    assert!(matches!(rx.try_recv(), Ok(AppEvent::Stats(_))));
    poller.abort();
}
