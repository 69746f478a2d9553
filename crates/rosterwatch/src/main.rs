//! `rosterwatch`: watch the channel and print a JSON roster report per
//! render tick on stdout.
//!
//! Configuration comes from `$ROSTERWATCH_CONFIG` (default
//! `rosterwatch.json`). Stop with Ctrl-C.
//!
//! The binary hosts the presence monitor only. It has no chat commands to
//! throttle, so the `rate_limits` section is validated at startup and then
//! left to hosts that embed the library and build a
//! [`LimiterRegistry`](rosterwatch::prelude::LimiterRegistry) from it.

use rosterwatch::prelude::*;
use rosterwatch_transport::TcpConnector;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    rosterwatch::telemetry::init_tracing("info");

    if let Err(e) = run().await {
        error!(error = %e, "rosterwatch exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), RosterwatchError> {
    let config = AppConfig::load_from_env()?.validated()?;
    info!(limiters = ?config.rate_limits.keys().collect::<Vec<_>>(), "configuration loaded");

    let monitor = PresenceMonitor::start(config.monitor.clone(), TcpConnector::default())?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let poll = PollScheduler::new(
        monitor.handle(),
        JsonLinesRenderer::new(std::io::stdout()),
        config.poll.clone(),
    );
    let poll_task = tokio::spawn(poll.run(std::future::ready(()), stop_rx));

    tokio::signal::ctrl_c()
        .await
        .map_err(RosterwatchError::Signal)?;
    info!("shutdown requested");

    stop_tx.send_replace(true);
    let _ = poll_task.await;
    monitor.shutdown().await
}
