//! End-to-end load runs against a local scripted server.

mod harness;

use harness::{Behavior, Event, TestServer};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use wsload::{ClientId, Config, Harness, Timeouts};

fn config(server: &TestServer, clients: usize) -> Config {
    Config::new()
        .with_address(server.addr().to_string())
        .with_client_count(clients)
        .with_spawn_delay(Duration::from_millis(10))
        .with_heartbeat_interval(Duration::from_millis(200))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_client_sends_heartbeats() {
    let mut server = TestServer::start(Behavior::Accept {
        greeting: Some("welcome; this is not json".to_string()),
    })
    .await;
    let harness = Harness::new(config(&server, 5)).unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let run = tokio::spawn(harness.run(async move {
        let _ = stopped.await;
    }));

    let mut seen = BTreeMap::new();
    while seen.len() < 5 {
        match server.next_event(Duration::from_secs(5)).await {
            Some(Event::Heartbeat(heartbeat)) => {
                assert_eq!(heartbeat.body, format!("HERE I AM {}", heartbeat.client_id));
                *seen.entry(heartbeat.client_id).or_insert(0) += 1;
            }
            Some(_) => {}
            None => panic!("only {} clients sent heartbeats", seen.len()),
        }
    }
    let ids: Vec<ClientId> = seen.keys().copied().collect();
    assert_eq!(ids, (0..5).map(ClientId::new).collect::<Vec<_>>());

    stop.send(()).unwrap();
    let report = run.await.unwrap();

    assert_eq!(report.attempted, 5);
    assert_eq!(report.established, 5);
    assert_eq!(report.active, 0);
    assert!(report.heartbeats_sent >= 5);
    assert_eq!(report.frames_received, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rejected_upgrades_are_abandoned() {
    let server = TestServer::start(Behavior::Reject).await;
    let harness = Harness::new(config(&server, 3)).unwrap();

    let report = harness
        .run(tokio::time::sleep(Duration::from_millis(500)))
        .await;

    assert_eq!(report.attempted, 3);
    assert_eq!(report.rejected, 3);
    assert_eq!(report.established, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(report.active, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unreachable_server_fails_each_slot() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = Config::new()
        .with_address(addr.to_string())
        .with_client_count(2)
        .with_spawn_delay(Duration::from_millis(10));
    let report = Harness::new(config)
        .unwrap()
        .run(tokio::time::sleep(Duration::from_millis(500)))
        .await;

    assert_eq!(report.attempted, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.established, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_server_close_ends_clients() {
    let mut server = TestServer::start(Behavior::CloseWith(1000)).await;
    let config = config(&server, 2).with_heartbeat_interval(Duration::from_secs(5));
    let harness = Harness::new(config).unwrap();
    let metrics = harness.session().metrics().clone();

    let (stop, stopped) = oneshot::channel::<()>();
    let run = tokio::spawn(harness.run(async move {
        let _ = stopped.await;
    }));

    let mut closed = 0;
    while closed < 2 {
        match server.next_event(Duration::from_secs(5)).await {
            Some(Event::Closed) => closed += 1,
            Some(_) => {}
            None => panic!("only {} clients answered the close", closed),
        }
    }

    // both clients are gone before any interrupt
    let deadline = Instant::now() + Duration::from_secs(2);
    while metrics.snapshot().active != 0 {
        assert!(Instant::now() < deadline, "clients still active");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    stop.send(()).unwrap();
    let report = run.await.unwrap();
    assert_eq!(report.established, 2);
    assert_eq!(report.active, 0);
    assert_eq!(report.heartbeats_sent, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interrupt_returns_within_grace() {
    let mut server = TestServer::start(Behavior::Accept { greeting: None }).await;
    let grace = Duration::from_secs(2);
    let config = config(&server, 3)
        .with_heartbeat_interval(Duration::from_secs(60))
        .with_timeouts(Timeouts {
            shutdown_grace: grace,
            ..Timeouts::default()
        });
    let harness = Harness::new(config).unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    let run = tokio::spawn(harness.run(async move {
        let _ = stopped.await;
    }));

    let mut connected = 0;
    while connected < 3 {
        match server.next_event(Duration::from_secs(5)).await {
            Some(Event::Connected) => connected += 1,
            Some(_) => {}
            None => panic!("only {} clients connected", connected),
        }
    }

    let interrupted = Instant::now();
    stop.send(()).unwrap();
    let report = run.await.unwrap();

    assert!(interrupted.elapsed() < grace + Duration::from_secs(1));
    assert_eq!(report.established, 3);
    assert_eq!(report.active, 0);

    let mut closed = 0;
    while let Some(event) = server.next_event(Duration::from_secs(1)).await {
        if event == Event::Closed {
            closed += 1;
        }
    }
    assert_eq!(closed, 3);
}
