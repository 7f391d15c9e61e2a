//! Position monitoring core.
//!
//! A [`PositionWatcher`] follows one symbol from "open" to a terminal state:
//! - [`roi`]: leveraged ROI after fees
//! - [`threshold`]: required ROI per trading mode
//! - [`evidence`]: closure confirmation from the engine log
//! - [`events`]: status events and the sinks that render them
//! - [`driver`]: the polling loop

pub mod driver;
pub mod events;
pub mod evidence;
pub mod report;
pub mod roi;
pub mod session;
pub mod threshold;
pub mod watcher;

pub use driver::run_session;
pub use events::{
    ChannelReportSink, Proximity, RecordingSink, Report, ReportSink, SessionSummary, StatusEvent,
    TracingReportSink, UnconfirmedReason,
};
pub use evidence::{
    check_closure, ClosureConfirmation, ClosureEvidence, ClosureMatcher, ClosurePhase,
    FileLogSource, LogEvidenceSource,
};
pub use report::{portfolio_report, PortfolioReport, PositionReport, ThresholdStatus};
pub use roi::{
    checked_position_roi, checked_roi_breakdown, position_roi, roi, roi_breakdown, RoiBreakdown,
};
pub use session::{MonitoringSession, RoiSample, WatchState};
pub use threshold::ThresholdPolicy;
pub use watcher::{PositionWatcher, TickOutcome, WatcherSettings};
