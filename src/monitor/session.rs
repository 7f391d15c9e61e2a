//! Per-symbol monitoring session state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Lifecycle of a watched position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchState {
    /// Polling; threshold not reached yet.
    Active,
    /// ROI met the threshold at least once; waiting for the engine to close.
    ThresholdHit,
    /// Symbol vanished from the snapshot; reconciling with the log.
    Confirming,
    /// Closure corroborated by the log.
    ClosedConfirmed,
    /// Symbol vanished without corroboration.
    ClosedUnconfirmed,
    /// Session exceeded its maximum duration.
    TimedOut,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WatchState::ClosedConfirmed | WatchState::ClosedUnconfirmed | WatchState::TimedOut
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchState::Active => "ACTIVE",
            WatchState::ThresholdHit => "THRESHOLD_HIT",
            WatchState::Confirming => "CONFIRMING",
            WatchState::ClosedConfirmed => "CLOSED_CONFIRMED",
            WatchState::ClosedUnconfirmed => "CLOSED_UNCONFIRMED",
            WatchState::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful ROI observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoiSample {
    pub at: DateTime<Utc>,
    pub roi: Decimal,
}

/// Mutable state owned by exactly one watcher.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSession {
    pub tracked_symbol: String,
    pub start_time: DateTime<Utc>,
    /// Ticks attempted, including failed fetches.
    pub tick_count: u64,
    pub fetch_errors: u64,
    pub consecutive_fetch_errors: u32,
    pub roi_history: Vec<RoiSample>,
    pub last_roi: Option<Decimal>,
    /// Threshold that applied on the most recent successful tick.
    pub last_threshold: Option<Decimal>,
    pub state: WatchState,
    pub threshold_hit_at: Option<DateTime<Utc>>,
}

impl MonitoringSession {
    pub fn new(symbol: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            tracked_symbol: symbol.to_string(),
            start_time,
            tick_count: 0,
            fetch_errors: 0,
            consecutive_fetch_errors: 0,
            roi_history: Vec::new(),
            last_roi: None,
            last_threshold: None,
            state: WatchState::Active,
            threshold_hit_at: None,
        }
    }

    /// Record a successful observation; returns the change from the previous one.
    pub fn record_roi(&mut self, at: DateTime<Utc>, roi: Decimal) -> Option<Decimal> {
        let change = self.last_roi.map(|prev| roi - prev);
        self.roi_history.push(RoiSample { at, roi });
        self.last_roi = Some(roi);
        self.consecutive_fetch_errors = 0;
        change
    }

    pub fn record_fetch_error(&mut self) -> u32 {
        self.fetch_errors += 1;
        self.consecutive_fetch_errors += 1;
        self.consecutive_fetch_errors
    }

    /// Number of ticks that produced an ROI sample.
    pub fn successful_ticks(&self) -> usize {
        self.roi_history.len()
    }

    /// The most recent `n` samples, oldest first.
    pub fn recent(&self, n: usize) -> &[RoiSample] {
        let start = self.roi_history.len().saturating_sub(n);
        &self.roi_history[start..]
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds()
    }

    /// ROI points still missing versus the last applicable threshold.
    pub fn shortfall(&self) -> Option<Decimal> {
        match (self.last_threshold, self.last_roi) {
            (Some(threshold), Some(roi)) => Some(threshold.saturating_sub(roi)),
            _ => None,
        }
    }
}
