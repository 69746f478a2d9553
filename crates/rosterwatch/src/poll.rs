//! Host-side timers: trigger roster queries and render the roster.
//!
//! Two independent fixed-period timers run on the host's runtime:
//!
//! - **query** (default 10 s): asks the network thread for a WHO once the
//!   channel is joined, a no-op before that.
//! - **render** (default 20 s): formats the latest completed roster and
//!   hands it to the [`RosterRenderer`], a no-op until the first query has
//!   completed.
//!
//! Neither timer touches the network. A stuck query just means the next
//! render shows the previous snapshot again.

use std::future::Future;
use std::time::Duration;

use rosterwatch_tick::{TickConfig, TickScheduler};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::render::format_roster;
use crate::supervisor::wait_for_shutdown;
use crate::{ConfigError, MonitorHandle, RosterRenderer};

/// Timer periods, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub query_interval_secs: f64,
    pub render_interval_secs: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            query_interval_secs: 10.0,
            render_interval_secs: 20.0,
        }
    }
}

impl PollConfig {
    pub fn query_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.query_interval_secs).unwrap_or(Duration::ZERO)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.render_interval_secs).unwrap_or(Duration::ZERO)
    }

    /// Both intervals must be positive and fit in a `Duration`.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (name, secs) in [
            ("query_interval_secs", self.query_interval_secs),
            ("render_interval_secs", self.render_interval_secs),
        ] {
            if !(secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok()) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number of seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }
}

/// Runs the query and render timers against one monitor.
pub struct PollScheduler<R> {
    monitor: MonitorHandle,
    renderer: R,
    config: PollConfig,
}

impl<R: RosterRenderer> PollScheduler<R> {
    pub fn new(monitor: MonitorHandle, renderer: R, config: PollConfig) -> Self {
        Self {
            monitor,
            renderer,
            config,
        }
    }

    /// Waits for `host_ready`, then ticks both timers until `shutdown`
    /// turns true or its sender is dropped.
    ///
    /// Each timer fires once right after `host_ready` and then once per
    /// period.
    pub async fn run(
        self,
        host_ready: impl Future<Output = ()>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => return,
            _ = host_ready => {}
        }
        info!(
            query_ms = self.config.query_interval().as_millis() as u64,
            render_ms = self.config.render_interval().as_millis() as u64,
            "host ready, starting poll timers"
        );

        let mut query_timer =
            TickScheduler::new(TickConfig::every(self.config.query_interval()).immediate());
        let mut render_timer =
            TickScheduler::new(TickConfig::every(self.config.render_interval()).immediate());

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = query_timer.wait_for_tick() => self.on_query_tick(),
                tick = render_timer.wait_for_tick() => {
                    if tick.ticks_skipped > 0 {
                        debug!(skipped = tick.ticks_skipped, "render fell behind its period");
                    }
                    self.on_render_tick().await;
                }
            }
        }

        debug!(
            queries = query_timer.tick_count(),
            renders = render_timer.tick_count(),
            "poll timers stopped"
        );
    }

    fn on_query_tick(&self) {
        if !self.monitor.is_ready() {
            trace!(phase = %self.monitor.phase(), "not joined yet, skipping query");
            return;
        }
        if !self.monitor.request_roster_query() {
            debug!("roster query not queued");
        }
    }

    async fn on_render_tick(&self) {
        let Some(snapshot) = self.monitor.current_roster() else {
            trace!("no completed roster query yet, skipping render");
            return;
        };

        let report = format_roster(&snapshot);
        match self.renderer.render(&report).await {
            Ok(()) => debug!(players = report.player_count, "roster rendered"),
            Err(e) => warn!(error = %e, "failed to render roster"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rosterwatch_protocol::Message;
    use rosterwatch_session::{SessionConfig, SessionMachine, SharedStatus};

    use super::*;
    use crate::RosterReport;
    use crate::monitor::MonitorCommand;
    use crate::render::RenderError;

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

    fn msg(line: &str) -> Message {
        line.parse().unwrap()
    }

    #[test]
    fn test_poll_config_defaults() {
        let config = PollConfig::default();
        assert_eq!(config.query_interval(), Duration::from_secs(10));
        assert_eq!(config.render_interval(), Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_poll_config_validate_rejects_non_positive() {
        let zero = PollConfig {
            render_interval_secs: 0.0,
            ..PollConfig::default()
        };
        assert!(zero.validate().is_err());

        let nan = PollConfig {
            query_interval_secs: f64::NAN,
            ..PollConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_poll_config_validate_rejects_interval_beyond_duration_range() {
        let huge = PollConfig {
            query_interval_secs: 1e20,
            ..PollConfig::default()
        };
        assert!(huge.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_for_join_and_first_query() {
        let shared = Arc::new(SharedStatus::new());
        let mut machine = SessionMachine::new(SessionConfig::default(), Arc::clone(&shared));
        let (handle, mut commands) = MonitorHandle::detached(shared);
        let renderer = CaptureRenderer::default();
        let (stop_tx, stop_rx) = watch::channel(false);

        let poll = PollScheduler::new(handle, renderer.clone(), PollConfig::default());
        let task = tokio::spawn(poll.run(std::future::ready(()), stop_rx));

        // t = 15 s: two query ticks and one render tick, all before join.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(commands.try_recv().is_err());
        assert!(renderer.reports.lock().unwrap().is_empty());

        machine.begin_connect().unwrap();
        machine.handle(&msg(":irc.test 001 D2kPlayerMonitor :Welcome"));
        machine.handle(&msg(":D2kPlayerMonitor!bot@host JOIN #cncnet"));

        // t = 25 s: the query tick at 20 s asks for a roster.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(commands.try_recv().ok(), Some(MonitorCommand::Query));
        assert!(renderer.reports.lock().unwrap().is_empty());

        machine.begin_query(std::time::Instant::now()).unwrap();
        machine.handle(&msg(
            ":irc.test 352 D2kPlayerMonitor #cncnet u DE irc.test Alice H :0 3 1.40 d2",
        ));
        machine.handle(&msg(":irc.test 315 D2kPlayerMonitor #cncnet :End of /WHO list."));

        // t = 45 s: the render tick at 40 s publishes the report.
        tokio::time::sleep(Duration::from_secs(20)).await;
        {
            let reports = renderer.reports.lock().unwrap();
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].title, "1 PLAYERS ONLINE :globe_with_meridians:");
            assert_eq!(reports[0].lines, [":green_circle: Alice"]);
        }

        stop_tx.send_replace(true);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_does_nothing_before_host_ready() {
        let shared = Arc::new(SharedStatus::new());
        let (handle, _commands) = MonitorHandle::detached(shared);
        let renderer = CaptureRenderer::default();
        let (stop_tx, stop_rx) = watch::channel(false);

        let poll = PollScheduler::new(handle, renderer.clone(), PollConfig::default());
        let task = tokio::spawn(poll.run(std::future::pending(), stop_rx));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!task.is_finished());

        stop_tx.send_replace(true);
        task.await.unwrap();
        assert!(renderer.reports.lock().unwrap().is_empty());
    }
}
