//! Status events emitted by the watcher, and the sinks that render them.
//!
//! The watcher never formats output itself. It pushes [`StatusEvent`]s into
//! a [`ReportSink`]; the tracing sink logs them, the channel sink turns them
//! into a stream any renderer can consume.

use super::evidence::{ClosureConfirmation, ClosurePhase};
use super::session::{RoiSample, WatchState};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// How close a position is to its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    Far,
    Close,
    Critical,
}

impl Proximity {
    /// Classify the remaining gap (threshold minus ROI, in ROI points).
    pub fn from_gap(gap: Decimal, critical_gap: Decimal, close_gap: Decimal) -> Self {
        if gap <= critical_gap {
            Proximity::Critical
        } else if gap <= close_gap {
            Proximity::Close
        } else {
            Proximity::Far
        }
    }
}

/// Why a disappearance could not be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnconfirmedReason {
    /// The log was readable but held no closure record.
    NoEvidence,
    /// The log could not be read.
    EvidenceUnavailable,
    /// Only an in-progress record was seen before attempts ran out.
    ConfirmationPending,
}

/// One observable step of a monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StatusEvent {
    Progress {
        symbol: String,
        at: DateTime<Utc>,
        roi: Decimal,
        net_pnl: Decimal,
        threshold: Decimal,
        gap: Decimal,
        /// `roi / threshold` as a fraction.
        progress: Decimal,
        roi_change: Option<Decimal>,
        proximity: Proximity,
    },
    ThresholdHit {
        symbol: String,
        at: DateTime<Utc>,
        roi: Decimal,
        net_pnl: Decimal,
        threshold: Decimal,
        overshoot: Decimal,
        roi_change: Option<Decimal>,
        /// Closure activity seen in the log on this tick, if any.
        closure: Option<ClosurePhase>,
    },
    ClosedConfirmed {
        symbol: String,
        at: DateTime<Utc>,
        last_roi: Option<Decimal>,
        confirmation: ClosureConfirmation,
    },
    ClosedUnconfirmed {
        symbol: String,
        at: DateTime<Utc>,
        last_roi: Option<Decimal>,
        reason: UnconfirmedReason,
    },
    TimedOut {
        symbol: String,
        at: DateTime<Utc>,
        elapsed_secs: i64,
        last_roi: Option<Decimal>,
        threshold: Option<Decimal>,
        shortfall: Option<Decimal>,
        /// The symbol had vanished and its closure was still unconfirmed.
        while_confirming: bool,
    },
    FetchError {
        symbol: String,
        at: DateTime<Utc>,
        error: String,
        consecutive: u32,
    },
}

impl StatusEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StatusEvent::Progress { .. } => "progress",
            StatusEvent::ThresholdHit { .. } => "threshold_hit",
            StatusEvent::ClosedConfirmed { .. } => "closed_confirmed",
            StatusEvent::ClosedUnconfirmed { .. } => "closed_unconfirmed",
            StatusEvent::TimedOut { .. } => "timed_out",
            StatusEvent::FetchError { .. } => "fetch_error",
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            StatusEvent::Progress { symbol, .. }
            | StatusEvent::ThresholdHit { symbol, .. }
            | StatusEvent::ClosedConfirmed { symbol, .. }
            | StatusEvent::ClosedUnconfirmed { symbol, .. }
            | StatusEvent::TimedOut { symbol, .. }
            | StatusEvent::FetchError { symbol, .. } => symbol,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            StatusEvent::Progress { at, .. }
            | StatusEvent::ThresholdHit { at, .. }
            | StatusEvent::ClosedConfirmed { at, .. }
            | StatusEvent::ClosedUnconfirmed { at, .. }
            | StatusEvent::TimedOut { at, .. }
            | StatusEvent::FetchError { at, .. } => *at,
        }
    }
}

/// Final account of a session, emitted once when it ends for any reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub symbol: String,
    pub final_state: WatchState,
    /// Stopped by the operator rather than by reaching a terminal state.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub tick_count: u64,
    pub fetch_errors: u64,
    pub last_roi: Option<Decimal>,
    pub threshold: Option<Decimal>,
    pub roi_history: Vec<RoiSample>,
}

impl SessionSummary {
    pub fn successful_ticks(&self) -> usize {
        self.roi_history.len()
    }

    pub fn duration_secs(&self) -> i64 {
        (self.ended_at - self.started_at).num_seconds()
    }

    /// The most recent `n` samples, oldest first.
    pub fn recent(&self, n: usize) -> &[RoiSample] {
        let start = self.roi_history.len().saturating_sub(n);
        &self.roi_history[start..]
    }
}

/// Consumer of a session's event stream.
pub trait ReportSink: Send {
    fn on_event(&mut self, event: &StatusEvent);

    fn on_summary(&mut self, _summary: &SessionSummary) {}
}

/// Renders events as structured log records.
#[derive(Debug, Clone)]
pub struct TracingReportSink {
    history_window: usize,
}

impl TracingReportSink {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }
}

impl ReportSink for TracingReportSink {
    fn on_event(&mut self, event: &StatusEvent) {
        match event {
            StatusEvent::Progress {
                symbol,
                roi,
                threshold,
                gap,
                progress,
                roi_change,
                proximity,
                ..
            } => {
                info!(
                    %symbol,
                    roi = %roi.round_dp(2),
                    threshold = %threshold,
                    gap = %gap.round_dp(2),
                    progress_pct = %progress.saturating_mul(Decimal::ONE_HUNDRED).round_dp(0),
                    change = ?roi_change.map(|c| c.round_dp(2)),
                    proximity = ?proximity,
                    "ROI progress"
                );
            }
            StatusEvent::ThresholdHit {
                symbol,
                roi,
                threshold,
                overshoot,
                closure,
                ..
            } => {
                info!(
                    %symbol,
                    roi = %roi.round_dp(2),
                    threshold = %threshold,
                    overshoot = %overshoot.round_dp(2),
                    closure = ?closure,
                    "✅ ROI threshold hit - early profit booking expected"
                );
            }
            StatusEvent::ClosedConfirmed {
                symbol,
                last_roi,
                confirmation,
                ..
            } => {
                info!(
                    %symbol,
                    last_roi = ?last_roi.map(|r| r.round_dp(2)),
                    exit_price = ?confirmation.exit_price,
                    net_pnl = ?confirmation.net_pnl,
                    reason = ?confirmation.reason,
                    log_message = %confirmation.message,
                    "✅ Position closed (confirmed in log)"
                );
            }
            StatusEvent::ClosedUnconfirmed {
                symbol,
                last_roi,
                reason,
                ..
            } => {
                warn!(
                    %symbol,
                    last_roi = ?last_roi.map(|r| r.round_dp(2)),
                    reason = ?reason,
                    "⚠️  Position disappeared without log confirmation"
                );
            }
            StatusEvent::TimedOut {
                symbol,
                elapsed_secs,
                last_roi,
                shortfall,
                while_confirming,
                ..
            } => {
                warn!(
                    %symbol,
                    elapsed_secs,
                    while_confirming,
                    last_roi = ?last_roi.map(|r| r.round_dp(2)),
                    shortfall = ?shortfall.map(|s| s.round_dp(2)),
                    "Monitoring time limit reached"
                );
            }
            StatusEvent::FetchError {
                symbol,
                error,
                consecutive,
                ..
            } => {
                warn!(%symbol, %error, consecutive, "Position fetch failed, retrying next tick");
            }
        }
    }

    fn on_summary(&mut self, summary: &SessionSummary) {
        info!(
            symbol = %summary.symbol,
            final_state = %summary.final_state,
            cancelled = summary.cancelled,
            duration_secs = summary.duration_secs(),
            ticks = summary.tick_count,
            successful_ticks = summary.successful_ticks(),
            fetch_errors = summary.fetch_errors,
            last_roi = ?summary.last_roi.map(|r| r.round_dp(2)),
            "📊 Monitoring session complete"
        );

        for sample in summary.recent(self.history_window) {
            info!(
                symbol = %summary.symbol,
                at = %sample.at.format("%H:%M:%S"),
                roi = %sample.roi.round_dp(2),
                "   ROI sample"
            );
        }
    }
}

/// Message carried by a [`ChannelReportSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Event(StatusEvent),
    Summary(SessionSummary),
}

/// Forwards events to an async channel, turning a session into a stream.
///
/// A dropped receiver is not an error for the watcher; reports are simply
/// discarded.
#[derive(Debug, Clone)]
pub struct ChannelReportSink {
    tx: mpsc::UnboundedSender<Report>,
}

impl ChannelReportSink {
    pub fn new(tx: mpsc::UnboundedSender<Report>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Report>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ReportSink for ChannelReportSink {
    fn on_event(&mut self, event: &StatusEvent) {
        let _ = self.tx.send(Report::Event(event.clone()));
    }

    fn on_summary(&mut self, summary: &SessionSummary) {
        let _ = self.tx.send(Report::Summary(summary.clone()));
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<StatusEvent>,
    pub summaries: Vec<SessionSummary>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.kind()).collect()
    }
}

impl ReportSink for RecordingSink {
    fn on_event(&mut self, event: &StatusEvent) {
        self.events.push(event.clone());
    }

    fn on_summary(&mut self, summary: &SessionSummary) {
        self.summaries.push(summary.clone());
    }
}
