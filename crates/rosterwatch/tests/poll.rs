//! The poll timers driving a real monitor over the in-memory transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rosterwatch::prelude::*;
use rosterwatch::{RenderError, RosterReport};
use rosterwatch_session::BackoffPolicy;
use rosterwatch_transport::{MemoryConnector, MemoryPeer};
use tokio::sync::watch;
use tokio::time::{Instant, timeout};

const TIMEOUT: Duration = Duration::from_secs(5);
const NICK: &str = "D2kPlayerMonitor";

#[derive(Clone, Default)]
struct CaptureRenderer {
    reports: Arc<Mutex<Vec<RosterReport>>>,
}

impl RosterRenderer for CaptureRenderer {
    async fn render(&self, report: &RosterReport) -> Result<(), RenderError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

async fn expect_line(peer: &mut MemoryPeer) -> String {
    timeout(TIMEOUT, peer.recv_line())
        .await
        .expect("timed out waiting for a line")
        .expect("client closed the connection")
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn test_poll_scheduler_queries_and_renders_live_roster() {
    let (connector, mut listener) = MemoryConnector::pair();
    let monitor = PresenceMonitor::start(
        SessionConfig {
            host: "irc.test".into(),
            backoff: BackoffPolicy {
                base_wait_secs: 0.01,
                max_wait_secs: 0.05,
                max_retries: 10,
            },
            ..SessionConfig::default()
        },
        connector,
    )
    .unwrap();

    let renderer = CaptureRenderer::default();
    let (stop_tx, stop_rx) = watch::channel(false);
    let poll = PollScheduler::new(
        monitor.handle(),
        renderer.clone(),
        PollConfig {
            query_interval_secs: 0.05,
            render_interval_secs: 0.05,
        },
    );
    let poll_task = tokio::spawn(poll.run(std::future::ready(()), stop_rx));

    let mut peer = timeout(TIMEOUT, listener.accept()).await.unwrap().unwrap();
    expect_line(&mut peer).await;
    expect_line(&mut peer).await;
    peer.send_line(&format!(":irc.test 001 {NICK} :Welcome"));
    assert_eq!(expect_line(&mut peer).await, "JOIN #cncnet");

    // Nothing is rendered or queried before the join.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(renderer.reports.lock().unwrap().is_empty());

    peer.send_line(&format!(":{NICK}!bot@host JOIN #cncnet"));
    assert_eq!(expect_line(&mut peer).await, "WHO #cncnet");

    peer.send_line(&format!(
        ":irc.test 352 {NICK} #cncnet u DE irc.test zed G :0 3 1.40 d2"
    ));
    peer.send_line(&format!(
        ":irc.test 352 {NICK} #cncnet u FR irc.test Amy H :0 3 1.40 d2"
    ));
    peer.send_line(&format!(":irc.test 315 {NICK} #cncnet :End of /WHO list."));

    wait_until("a rendered report", || {
        !renderer.reports.lock().unwrap().is_empty()
    })
    .await;
    let report = renderer.reports.lock().unwrap()[0].clone();
    assert_eq!(report.title, "2 PLAYERS ONLINE :globe_with_meridians:");
    assert_eq!(report.lines, [":green_circle: Amy", ":red_circle: zed"]);

    stop_tx.send_replace(true);
    poll_task.await.unwrap();
    monitor.shutdown().await.unwrap();
}
