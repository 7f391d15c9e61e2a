//! Per-symbol watcher state machine.
//!
//! Each tick fetches one position snapshot and advances the session:
//! - symbol present: compute ROI and compare with its threshold
//! - symbol absent: reconcile the disappearance with the engine log
//! - fetch failure: report it and try again next tick
//!
//! The watcher never sleeps; cadence belongs to the driver.

use super::events::{Proximity, ReportSink, SessionSummary, StatusEvent, UnconfirmedReason};
use super::evidence::{check_closure, ClosureEvidence, ClosureMatcher, LogEvidenceSource};
use super::roi::{checked_position_roi, position_roi};
use super::session::{MonitoringSession, WatchState};
use super::threshold::ThresholdPolicy;
use crate::config::Config;
use crate::error::{WatchError, WatchResult};
use crate::source::{Position, PositionSnapshotSource};
use crate::utils::decimal::safe_div;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Everything a watcher needs besides its sources.
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub policy: ThresholdPolicy,
    pub matcher: ClosureMatcher,
    pub fee_rate: Decimal,
    pub max_monitoring: chrono::Duration,
    pub snapshot_timeout: Duration,
    pub read_timeout: Duration,
    pub lookback_lines: usize,
    /// Total log checks allowed while a close is only in progress
    pub confirmation_attempts: u32,
    /// Log records older than session start minus this are ignored
    pub stale_grace: chrono::Duration,
    pub critical_gap: Decimal,
    pub close_gap: Decimal,
}

impl WatcherSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: ThresholdPolicy::from_config(&config.watch),
            matcher: ClosureMatcher::from_config(&config.evidence),
            fee_rate: config.watch.fee_rate,
            max_monitoring: seconds(config.watch.max_monitoring_seconds),
            snapshot_timeout: Duration::from_secs(config.api.request_timeout_secs),
            read_timeout: Duration::from_secs(config.evidence.read_timeout_secs),
            lookback_lines: config.evidence.lookback_lines,
            confirmation_attempts: config.watch.confirmation_attempts,
            stale_grace: seconds(config.evidence.stale_grace_secs),
            critical_gap: config.watch.critical_gap,
            close_gap: config.watch.close_gap,
        }
    }
}

/// Whole seconds as a signed duration, saturating instead of wrapping.
fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Done(WatchState),
}

/// Drives one [`MonitoringSession`] to a terminal state.
pub struct PositionWatcher {
    snapshots: Arc<dyn PositionSnapshotSource>,
    evidence: Arc<dyn LogEvidenceSource>,
    settings: WatcherSettings,
    matcher: ClosureMatcher,
    session: MonitoringSession,
    /// Log checks made during the current confirmation
    confirm_attempts: u32,
    /// State to return to if the symbol reappears while confirming
    resume_state: Option<WatchState>,
}

impl PositionWatcher {
    pub fn new(
        symbol: &str,
        snapshots: Arc<dyn PositionSnapshotSource>,
        evidence: Arc<dyn LogEvidenceSource>,
        settings: WatcherSettings,
        start_time: DateTime<Utc>,
    ) -> Self {
        let matcher = settings
            .matcher
            .clone()
            .not_before(
                start_time
                    .checked_sub_signed(settings.stale_grace)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            );

        Self {
            snapshots,
            evidence,
            settings,
            matcher,
            session: MonitoringSession::new(symbol, start_time),
            confirm_attempts: 0,
            resume_state: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.session.tracked_symbol
    }

    /// Name of the snapshot source, for logs.
    pub fn source_name(&self) -> &str {
        self.snapshots.name()
    }

    pub fn state(&self) -> WatchState {
        self.session.state
    }

    pub fn session(&self) -> &MonitoringSession {
        &self.session
    }

    /// Run one tick at the current wall-clock time.
    pub async fn tick(&mut self, sink: &mut dyn ReportSink) -> TickOutcome {
        self.tick_at(Utc::now(), sink).await
    }

    /// Run one tick as of `now`.
    pub async fn tick_at(
        &mut self,
        now: DateTime<Utc>,
        sink: &mut dyn ReportSink,
    ) -> TickOutcome {
        let state = self.session.state;
        if state.is_terminal() {
            return TickOutcome::Done(state);
        }

        let elapsed = now - self.session.start_time;
        if elapsed > self.settings.max_monitoring {
            return self.time_out(now, elapsed.num_seconds(), sink);
        }

        self.session.tick_count += 1;

        match self.fetch_tracked().await {
            Err(e) => {
                let consecutive = self.session.record_fetch_error();
                sink.on_event(&StatusEvent::FetchError {
                    symbol: self.symbol().to_string(),
                    at: now,
                    error: e.to_string(),
                    consecutive,
                });
                TickOutcome::Continue
            }
            Ok(None) => self.confirm_closure(now, sink).await,
            Ok(Some(position)) => {
                if let Some(resume) = self.resume_state.take() {
                    info!(
                        symbol = %self.symbol(),
                        resume = %resume,
                        "Position reappeared while confirming closure"
                    );
                    self.session.state = resume;
                    self.confirm_attempts = 0;
                }
                self.observe(now, &position, sink).await
            }
        }
    }

    /// Final account of the session as of now.
    pub fn summary(&self, cancelled: bool) -> SessionSummary {
        self.summary_at(Utc::now(), cancelled)
    }

    pub fn summary_at(&self, ended_at: DateTime<Utc>, cancelled: bool) -> SessionSummary {
        SessionSummary {
            symbol: self.session.tracked_symbol.clone(),
            final_state: self.session.state,
            cancelled,
            started_at: self.session.start_time,
            ended_at,
            tick_count: self.session.tick_count,
            fetch_errors: self.session.fetch_errors,
            last_roi: self.session.last_roi,
            threshold: self.session.last_threshold,
            roi_history: self.session.roi_history.clone(),
        }
    }

    /// Fetch a snapshot and pick out the tracked symbol.
    async fn fetch_tracked(&self) -> WatchResult<Option<Position>> {
        let snapshot = tokio::time::timeout(
            self.settings.snapshot_timeout,
            self.snapshots.fetch_positions(),
        )
        .await
        .map_err(|_| WatchError::Timeout {
            what: "position snapshot",
            after_secs: self.settings.snapshot_timeout.as_secs(),
        })??;

        let position = match snapshot.find(self.symbol()).transpose()? {
            Some(position) => position,
            None => return Ok(None),
        };

        if checked_position_roi(&position, self.settings.fee_rate).is_none() {
            return Err(WatchError::MalformedResponse {
                symbol: position.symbol,
                reason: "position values overflow decimal range".to_string(),
            });
        }

        Ok(Some(position))
    }

    async fn observe(
        &mut self,
        now: DateTime<Utc>,
        position: &Position,
        sink: &mut dyn ReportSink,
    ) -> TickOutcome {
        let symbol = self.symbol().to_string();
        let threshold = self
            .settings
            .policy
            .threshold_for_position(&symbol, &position.mode);
        let breakdown = position_roi(position, self.settings.fee_rate);
        let roi = breakdown.roi_percent;

        let roi_change = self.session.record_roi(now, roi);
        self.session.last_threshold = Some(threshold);

        if roi >= threshold {
            if self.session.state != WatchState::ThresholdHit {
                self.session.state = WatchState::ThresholdHit;
                self.session.threshold_hit_at = Some(now);
            }

            let check = check_closure(
                self.evidence.as_ref(),
                &self.matcher,
                &symbol,
                self.settings.lookback_lines,
                self.settings.read_timeout,
            )
            .await;

            sink.on_event(&StatusEvent::ThresholdHit {
                symbol,
                at: now,
                roi,
                net_pnl: breakdown.net_pnl,
                threshold,
                overshoot: roi.saturating_sub(threshold),
                roi_change,
                closure: check.evidence.phase(),
            });
        } else {
            let gap = threshold.saturating_sub(roi);
            sink.on_event(&StatusEvent::Progress {
                symbol,
                at: now,
                roi,
                net_pnl: breakdown.net_pnl,
                threshold,
                gap,
                progress: safe_div(roi, threshold),
                roi_change,
                proximity: Proximity::from_gap(
                    gap,
                    self.settings.critical_gap,
                    self.settings.close_gap,
                ),
            });
        }

        TickOutcome::Continue
    }

    async fn confirm_closure(
        &mut self,
        now: DateTime<Utc>,
        sink: &mut dyn ReportSink,
    ) -> TickOutcome {
        if self.session.state != WatchState::Confirming {
            debug!(
                symbol = %self.symbol(),
                from = %self.session.state,
                "Position missing from snapshot, confirming closure"
            );
            self.resume_state = Some(self.session.state);
            self.session.state = WatchState::Confirming;
            self.confirm_attempts = 0;
        }

        self.confirm_attempts += 1;
        let symbol = self.symbol().to_string();
        let check = check_closure(
            self.evidence.as_ref(),
            &self.matcher,
            &symbol,
            self.settings.lookback_lines,
            self.settings.read_timeout,
        )
        .await;

        let reason = match check.evidence {
            ClosureEvidence::Completed(confirmation) => {
                self.finish(WatchState::ClosedConfirmed);
                sink.on_event(&StatusEvent::ClosedConfirmed {
                    symbol,
                    at: now,
                    last_roi: self.session.last_roi,
                    confirmation,
                });
                return TickOutcome::Done(WatchState::ClosedConfirmed);
            }
            ClosureEvidence::InProgress(_)
                if self.confirm_attempts < self.settings.confirmation_attempts =>
            {
                info!(
                    %symbol,
                    attempt = self.confirm_attempts,
                    max_attempts = self.settings.confirmation_attempts,
                    "Close in progress, re-checking next tick"
                );
                return TickOutcome::Continue;
            }
            ClosureEvidence::InProgress(_) => UnconfirmedReason::ConfirmationPending,
            ClosureEvidence::Absent if !check.source_available => {
                UnconfirmedReason::EvidenceUnavailable
            }
            ClosureEvidence::Absent => UnconfirmedReason::NoEvidence,
        };

        self.finish(WatchState::ClosedUnconfirmed);
        sink.on_event(&StatusEvent::ClosedUnconfirmed {
            symbol,
            at: now,
            last_roi: self.session.last_roi,
            reason,
        });
        TickOutcome::Done(WatchState::ClosedUnconfirmed)
    }

    fn time_out(
        &mut self,
        now: DateTime<Utc>,
        elapsed_secs: i64,
        sink: &mut dyn ReportSink,
    ) -> TickOutcome {
        let while_confirming = self.session.state == WatchState::Confirming;
        self.finish(WatchState::TimedOut);
        sink.on_event(&StatusEvent::TimedOut {
            symbol: self.symbol().to_string(),
            at: now,
            elapsed_secs,
            last_roi: self.session.last_roi,
            threshold: self.session.last_threshold,
            shortfall: self.session.shortfall(),
            while_confirming,
        });
        TickOutcome::Done(WatchState::TimedOut)
    }

    fn finish(&mut self, state: WatchState) {
        self.session.state = state;
        self.resume_state = None;
    }
}
