//! One-shot ROI report over every open position.

use super::roi::position_roi;
use super::threshold::ThresholdPolicy;
use crate::error::WatchResult;
use crate::source::{PositionSide, PositionSnapshot, PositionSnapshotSource};
use crate::utils::decimal::{mean, percentage_change, round_to_precision, safe_div};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};

/// Where a position stands against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ThresholdStatus {
    Hit { overshoot: Decimal },
    Waiting { gap: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionReport {
    pub symbol: String,
    pub side: PositionSide,
    pub mode: String,
    pub entry_price: Decimal,
    pub reference_price: Decimal,
    pub leverage: Decimal,
    /// Unleveraged size at entry.
    pub notional: Decimal,
    pub roi: Decimal,
    pub net_pnl: Decimal,
    pub threshold: Decimal,
    /// Raw price move from entry to reference, in percent.
    pub price_move_pct: Decimal,
    pub status: ThresholdStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioReport {
    pub generated_at: DateTime<Utc>,
    pub positions: Vec<PositionReport>,
    /// Records that could not be parsed.
    pub skipped: usize,
    pub average_roi: Decimal,
    pub profitable: usize,
    pub win_rate: Decimal,
    /// Symbols at or above their threshold.
    pub threshold_hits: Vec<String>,
}

impl PortfolioReport {
    pub fn from_snapshot(
        snapshot: &PositionSnapshot,
        policy: &ThresholdPolicy,
        fee_rate: Decimal,
    ) -> Self {
        let (parsed, skipped) = snapshot.parse_all();

        let positions: Vec<PositionReport> = parsed
            .into_iter()
            .map(|p| {
                let breakdown = position_roi(&p, fee_rate);
                let threshold = policy.threshold_for_position(&p.symbol, &p.mode);
                let roi = breakdown.roi_percent;
                let status = if roi >= threshold {
                    ThresholdStatus::Hit {
                        overshoot: roi.saturating_sub(threshold),
                    }
                } else {
                    ThresholdStatus::Waiting {
                        gap: threshold.saturating_sub(roi),
                    }
                };

                PositionReport {
                    price_move_pct: percentage_change(p.entry_price, p.reference_price),
                    notional: p.notional(),
                    symbol: p.symbol,
                    side: p.side,
                    mode: p.mode,
                    entry_price: p.entry_price,
                    reference_price: p.reference_price,
                    leverage: p.leverage,
                    roi,
                    net_pnl: breakdown.net_pnl,
                    threshold,
                    status,
                }
            })
            .collect();

        let rois: Vec<Decimal> = positions.iter().map(|p| p.roi).collect();
        let profitable = positions
            .iter()
            .filter(|p| p.net_pnl > Decimal::ZERO)
            .count();
        let threshold_hits = positions
            .iter()
            .filter(|p| matches!(p.status, ThresholdStatus::Hit { .. }))
            .map(|p| p.symbol.clone())
            .collect();

        Self {
            generated_at: snapshot.fetched_at,
            average_roi: mean(&rois),
            win_rate: safe_div(Decimal::from(profitable), Decimal::from(positions.len()))
                * dec!(100),
            profitable,
            threshold_hits,
            skipped,
            positions,
        }
    }

    /// Log the report the way the watcher logs its events.
    pub fn log(&self) {
        info!(
            positions = self.positions.len(),
            at = %self.generated_at.format("%Y-%m-%d %H:%M:%S"),
            "📊 ROI report"
        );

        for p in &self.positions {
            let status = match p.status {
                ThresholdStatus::Hit { overshoot } => {
                    format!("HIT (+{}%)", round_to_precision(overshoot, 2))
                }
                ThresholdStatus::Waiting { gap } => {
                    format!("waiting ({}% to go)", round_to_precision(gap, 2))
                }
            };
            info!(
                symbol = %p.symbol,
                side = %p.side,
                mode = %p.mode,
                leverage = %p.leverage,
                price_move_pct = %round_to_precision(p.price_move_pct, 2),
                roi = %round_to_precision(p.roi, 2),
                net_pnl = %round_to_precision(p.net_pnl, 4),
                threshold = %p.threshold,
                %status,
                "  Position"
            );
        }

        if self.skipped > 0 {
            warn!(skipped = self.skipped, "Malformed position records skipped");
        }

        info!(
            average_roi = %round_to_precision(self.average_roi, 2),
            profitable = self.profitable,
            win_rate = %round_to_precision(self.win_rate, 1),
            hits = ?self.threshold_hits,
            "📈 Portfolio summary"
        );
    }
}

/// Fetch one snapshot and build a report from it.
pub async fn portfolio_report(
    source: &dyn PositionSnapshotSource,
    policy: &ThresholdPolicy,
    fee_rate: Decimal,
) -> WatchResult<PortfolioReport> {
    let snapshot = source.fetch_positions().await?;
    Ok(PortfolioReport::from_snapshot(&snapshot, policy, fee_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Position, ScriptedPositionSource};
    use serde_json::json;

    const FEE: Decimal = dec!(0.0004);

    fn position(symbol: &str, side: PositionSide, reference: Decimal, mode: &str) -> Position {
        Position {
            symbol: symbol.to_string(),
            side,
            entry_price: dec!(100),
            reference_price: reference,
            remaining_quantity: dec!(10),
            leverage: dec!(5),
            mode: mode.to_string(),
        }
    }

    #[test]
    fn test_report_aggregates() {
        let mut snapshot = PositionSnapshot::from_positions(&[
            position("AAAUSDT", PositionSide::Long, dec!(110), "swing"),
            position("BBBUSDT", PositionSide::Long, dec!(101), "swing"),
            position("CCCUSDT", PositionSide::Short, dec!(110), "scalp"),
        ]);
        snapshot.records.push(json!({ "symbol": "BROKEN", "side": "LONG" }));

        let report = PortfolioReport::from_snapshot(&snapshot, &ThresholdPolicy::default(), FEE);

        assert_eq!(report.positions.len(), 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.profitable, 2);
        assert_eq!(report.threshold_hits, vec!["AAAUSDT".to_string()]);
        // (49.58 + 4.598 - 50.42) / 3
        assert_eq!(report.average_roi.round_dp(4), dec!(1.2527));

        let aaa = &report.positions[0];
        assert_eq!(aaa.price_move_pct, dec!(10));
        assert_eq!(aaa.notional, dec!(1000));
        assert_eq!(
            aaa.status,
            ThresholdStatus::Hit {
                overshoot: dec!(41.58)
            }
        );

        let ccc = &report.positions[2];
        assert_eq!(ccc.threshold, dec!(5));
        assert_eq!(
            ccc.status,
            ThresholdStatus::Waiting {
                gap: dec!(55.42)
            }
        );
    }

    #[test]
    fn test_empty_report() {
        let report = PortfolioReport::from_snapshot(
            &PositionSnapshot::new(Vec::new()),
            &ThresholdPolicy::default(),
            FEE,
        );
        assert!(report.positions.is_empty());
        assert_eq!(report.average_roi, Decimal::ZERO);
        assert_eq!(report.win_rate, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_portfolio_report_from_source() {
        let source = ScriptedPositionSource::new();
        source
            .push_positions(&[position("AAAUSDT", PositionSide::Long, dec!(110), "swing")])
            .await;

        let report = portfolio_report(&source, &ThresholdPolicy::default(), FEE)
            .await
            .unwrap();
        assert_eq!(report.win_rate, dec!(100));
        assert_eq!(report.positions[0].roi, dec!(49.58));
    }

    #[tokio::test]
    async fn test_portfolio_report_propagates_fetch_error() {
        let source = ScriptedPositionSource::new();
        source.push_failure("engine down").await;

        assert!(portfolio_report(&source, &ThresholdPolicy::default(), FEE)
            .await
            .is_err());
    }
}
