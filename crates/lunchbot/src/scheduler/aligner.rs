use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use lunchbot_core::clock::Clock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::shutdown::wait_for_shutdown;

const ALIGN_POLL: Duration = Duration::from_secs(1);

/// Wait until the UTC wall-clock minute is one of `starting_minutes`, then
/// call `on_tick` every `tick_interval` until shutdown.
///
/// The first tick fires as soon as alignment is reached. Ticks missed while
/// `on_tick` was busy are skipped, not replayed. Shutdown during alignment
/// returns without ticking.
pub async fn align_then_run<F, Fut>(
    name: &'static str,
    clock: Arc<dyn Clock>,
    starting_minutes: &[u32],
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut on_tick: F,
) where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = ()>,
{
    tracing::info!(dispatcher = name, ?starting_minutes, "waiting for a starting minute");

    let mut poll = tokio::time::interval(ALIGN_POLL);
    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => {
                tracing::info!(dispatcher = name, "stopped before alignment");
                return;
            }
            _ = poll.tick() => {
                if starting_minutes.contains(&clock.now_utc().minute()) {
                    break;
                }
            }
        }
    }

    tracing::info!(
        dispatcher = name,
        at = %clock.now_utc(),
        interval_secs = tick_interval.as_secs(),
        "aligned; ticking"
    );

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = ticker.tick() => on_tick(clock.now_utc()).await,
        }
    }
    tracing::info!(dispatcher = name, "stopped");
}
