//! Closure confirmation from the engine's structured log.
//!
//! The position snapshot and the log are updated independently, so a
//! symbol disappearing from the snapshot is only a hint. This module looks
//! for an explicit close record in a bounded tail of the log:
//! - the record must parse as JSON (other lines are skipped)
//! - its `fields.symbol` must equal the tracked symbol exactly
//! - its message must contain a configured closure phrase
//!
//! Only the most recent matching record counts.

use crate::config::EvidenceConfig;
use crate::error::{WatchError, WatchResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

/// Read access to an append-only, most-recent-last log.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LogEvidenceSource: Send + Sync {
    /// Human-readable location (file path, URL) for diagnostics.
    fn describe(&self) -> String;

    /// Up to `max_lines` of the most recent lines, oldest first.
    async fn recent_lines(&self, max_lines: usize) -> WatchResult<Vec<String>>;
}

/// Tails a JSON-lines log file on disk.
///
/// Only the last `tail_bytes` of the file are read, so a multi-gigabyte
/// log costs the same as a small one.
#[derive(Debug, Clone)]
pub struct FileLogSource {
    path: PathBuf,
    tail_bytes: u64,
}

impl FileLogSource {
    pub fn new(path: impl Into<PathBuf>, tail_bytes: u64) -> Self {
        Self {
            path: path.into(),
            tail_bytes,
        }
    }

    pub fn from_config(config: &EvidenceConfig) -> Self {
        Self::new(&config.log_path, config.tail_bytes)
    }

    async fn read_tail(&self) -> std::io::Result<String> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        let start = len.saturating_sub(self.tail_bytes);
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = Vec::with_capacity((len - start) as usize);
        file.read_to_end(&mut buf).await?;
        let text = String::from_utf8_lossy(&buf).into_owned();

        // Starting mid-file means the first line is a fragment
        if start > 0 {
            return Ok(match text.find('\n') {
                Some(idx) => text[idx + 1..].to_string(),
                None => String::new(),
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl LogEvidenceSource for FileLogSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn recent_lines(&self, max_lines: usize) -> WatchResult<Vec<String>> {
        let text = self.read_tail().await.map_err(|e| {
            WatchError::EvidenceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(max_lines);
        Ok(lines[start..].iter().map(|l| l.to_string()).collect())
    }
}

/// Where a matched closure stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosurePhase {
    /// The engine announced it is closing the position.
    Closing,
    /// The engine placed the full close order / booked the profit.
    Closed,
}

/// Details lifted from the matching log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosureConfirmation {
    pub phase: ClosurePhase,
    pub message: String,
    pub logged_at: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub net_pnl: Option<Decimal>,
    pub reason: Option<String>,
}

/// Outcome of correlating the log with a tracked symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum ClosureEvidence {
    Completed(ClosureConfirmation),
    InProgress(ClosureConfirmation),
    Absent,
}

impl ClosureEvidence {
    pub fn phase(&self) -> Option<ClosurePhase> {
        match self {
            ClosureEvidence::Completed(_) => Some(ClosurePhase::Closed),
            ClosureEvidence::InProgress(_) => Some(ClosurePhase::Closing),
            ClosureEvidence::Absent => None,
        }
    }
}

/// Result of one evidence check, including whether the log was readable.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceCheck {
    pub evidence: ClosureEvidence,
    pub source_available: bool,
    pub lines_scanned: usize,
}

#[derive(Debug, Deserialize)]
struct LogRecord {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, alias = "msg")]
    message: Option<String>,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl LogRecord {
    /// Message text; tracing's JSON layout nests it under `fields`.
    fn message(&self) -> &str {
        self.message
            .as_deref()
            .or_else(|| self.fields.get("message").and_then(|m| m.as_str()))
            .unwrap_or("")
    }

    fn symbol(&self) -> Option<&str> {
        self.fields.get("symbol").and_then(|s| s.as_str())
    }

    fn logged_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    fn decimal_field(&self, keys: &[&str]) -> Option<Decimal> {
        keys.iter()
            .filter_map(|key| self.fields.get(*key))
            .find_map(|value| match value {
                serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
                serde_json::Value::String(s) => Decimal::from_str(s).ok(),
                _ => None,
            })
    }
}

/// Matches closure records for a symbol in a window of log lines.
#[derive(Debug, Clone)]
pub struct ClosureMatcher {
    completion_markers: Vec<String>,
    progress_markers: Vec<String>,
    not_before: Option<DateTime<Utc>>,
}

impl ClosureMatcher {
    pub fn new(completion_markers: &[String], progress_markers: &[String]) -> Self {
        Self {
            completion_markers: completion_markers.iter().map(|m| m.to_lowercase()).collect(),
            progress_markers: progress_markers.iter().map(|m| m.to_lowercase()).collect(),
            not_before: None,
        }
    }

    pub fn from_config(config: &EvidenceConfig) -> Self {
        Self::new(&config.completion_markers, &config.progress_markers)
    }

    /// Ignore records timestamped before `cutoff`.
    pub fn not_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.not_before = Some(cutoff);
        self
    }

    /// Find the most recent closure record for `symbol`.
    pub fn correlate(&self, lines: &[String], symbol: &str) -> ClosureEvidence {
        for line in lines.iter().rev() {
            let record: LogRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(_) => continue,
            };

            if record.symbol() != Some(symbol) {
                continue;
            }

            let logged_at = record.logged_at();
            if let (Some(cutoff), Some(at)) = (self.not_before, logged_at) {
                if at < cutoff {
                    continue;
                }
            }

            let message = record.message().to_lowercase();
            let phase = if self.completion_markers.iter().any(|m| message.contains(m)) {
                ClosurePhase::Closed
            } else if self.progress_markers.iter().any(|m| message.contains(m)) {
                ClosurePhase::Closing
            } else {
                continue;
            };

            let confirmation = ClosureConfirmation {
                phase,
                message: record.message().to_string(),
                logged_at,
                exit_price: record.decimal_field(&["current_price", "price", "exit_price"]),
                net_pnl: record.decimal_field(&["net_pnl", "realized_pnl"]),
                reason: record
                    .fields
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .map(String::from),
            };

            return match phase {
                ClosurePhase::Closed => ClosureEvidence::Completed(confirmation),
                ClosurePhase::Closing => ClosureEvidence::InProgress(confirmation),
            };
        }

        ClosureEvidence::Absent
    }
}

/// Read the log tail and correlate it, degrading to `Absent` on any failure.
pub async fn check_closure(
    source: &dyn LogEvidenceSource,
    matcher: &ClosureMatcher,
    symbol: &str,
    lookback_lines: usize,
    read_timeout: Duration,
) -> EvidenceCheck {
    let lines = match tokio::time::timeout(read_timeout, source.recent_lines(lookback_lines)).await
    {
        Ok(Ok(lines)) => lines,
        Ok(Err(e)) => {
            warn!(%symbol, source = %source.describe(), error = %e, "Closure evidence unavailable");
            return EvidenceCheck {
                evidence: ClosureEvidence::Absent,
                source_available: false,
                lines_scanned: 0,
            };
        }
        Err(_) => {
            warn!(
                %symbol,
                source = %source.describe(),
                timeout_secs = read_timeout.as_secs(),
                "Closure evidence read timed out"
            );
            return EvidenceCheck {
                evidence: ClosureEvidence::Absent,
                source_available: false,
                lines_scanned: 0,
            };
        }
    };

    let evidence = matcher.correlate(&lines, symbol);
    debug!(
        %symbol,
        lines = lines.len(),
        phase = ?evidence.phase(),
        "Correlated closure evidence"
    );

    EvidenceCheck {
        evidence,
        source_available: true,
        lines_scanned: lines.len(),
    }
}
