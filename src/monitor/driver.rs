//! Polling loop around a [`PositionWatcher`].

use super::events::{ReportSink, SessionSummary};
use super::watcher::{PositionWatcher, TickOutcome};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Tick `watcher` every `poll_interval` until it reaches a terminal state
/// or `shutdown` flips to `true`.
///
/// A tick in flight always completes; only the sleep between ticks is
/// interrupted. The summary is passed to `sink` before it is returned.
pub async fn run_session(
    mut watcher: PositionWatcher,
    sink: &mut dyn ReportSink,
    mut shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
) -> SessionSummary {
    info!(
        symbol = %watcher.symbol(),
        source = watcher.source_name(),
        interval_secs = poll_interval.as_secs_f64(),
        "🔍 Watching position"
    );

    let cancelled = loop {
        if let TickOutcome::Done(state) = watcher.tick(sink).await {
            debug!(symbol = %watcher.symbol(), %state, "Watcher reached terminal state");
            break false;
        }

        if *shutdown.borrow() {
            break true;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => break true,
                Ok(()) => {}
                // Sender gone: nobody can cancel us any more
                Err(_) => tokio::time::sleep(poll_interval).await,
            },
        }
    };

    if cancelled {
        info!(symbol = %watcher.symbol(), state = %watcher.state(), "🛑 Watch cancelled");
    }

    let summary = watcher.summary(cancelled);
    sink.on_summary(&summary);
    summary
}
