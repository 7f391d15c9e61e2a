//! Source-agnostic trait for position snapshot providers.
//!
//! The watcher only needs "give me every open position right now"; the
//! HTTP client, the scripted test source and any future transport all sit
//! behind this one seam.

use crate::error::WatchResult;
use async_trait::async_trait;

use super::types::PositionSnapshot;

/// Read-only view of the engine's open positions.
#[async_trait]
pub trait PositionSnapshotSource: Send + Sync {
    /// Short name used in logs (e.g. "http", "scripted").
    fn name(&self) -> &str;

    /// Fetch every currently open position.
    ///
    /// A symbol missing from the result is meaningful (the position is no
    /// longer open) and must not be reported as an error.
    async fn fetch_positions(&self) -> WatchResult<PositionSnapshot>;
}
