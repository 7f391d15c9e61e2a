//! Scripted position source for dry runs and state-machine tests.

use super::traits::PositionSnapshotSource;
use super::types::{Position, PositionSnapshot};
use crate::error::{WatchError, WatchResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// A successful snapshot with these raw records.
    Snapshot(Vec<serde_json::Value>),
    /// A transport failure.
    Fail(String),
    /// A response that never arrives (exercises per-call timeouts).
    Hang,
}

/// Position source that replays a fixed script.
///
/// Each fetch consumes one step; once the script runs out the last step
/// repeats forever.
#[derive(Debug, Default)]
pub struct ScriptedPositionSource {
    steps: Mutex<VecDeque<ScriptStep>>,
    last: Mutex<Option<ScriptStep>>,
    fetch_count: AtomicU64,
}

impl ScriptedPositionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot containing these positions.
    pub async fn push_positions(&self, positions: &[Position]) {
        let records = PositionSnapshot::from_positions(positions).records;
        self.push(ScriptStep::Snapshot(records)).await;
    }

    /// Queue a snapshot with no open positions.
    pub async fn push_empty(&self) {
        self.push(ScriptStep::Snapshot(Vec::new())).await;
    }

    /// Queue a transport failure.
    pub async fn push_failure(&self, message: &str) {
        self.push(ScriptStep::Fail(message.to_string())).await;
    }

    pub async fn push(&self, step: ScriptStep) {
        self.steps.lock().await.push_back(step);
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    async fn next_step(&self) -> Option<ScriptStep> {
        let mut last = self.last.lock().await;
        if let Some(step) = self.steps.lock().await.pop_front() {
            *last = Some(step);
        }
        last.clone()
    }
}

#[async_trait]
impl PositionSnapshotSource for ScriptedPositionSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_positions(&self) -> WatchResult<PositionSnapshot> {
        let n = self.fetch_count.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self.next_step().await;
        debug!(fetch = n, step = ?step, "Scripted position fetch");

        match step {
            Some(ScriptStep::Snapshot(records)) => Ok(PositionSnapshot::new(records)),
            Some(ScriptStep::Fail(message)) => Err(WatchError::TransientFetch(message)),
            Some(ScriptStep::Hang) => {
                std::future::pending::<()>().await;
                unreachable!("pending future never resolves")
            }
            None => Err(WatchError::TransientFetch("script is empty".to_string())),
        }
    }
}
