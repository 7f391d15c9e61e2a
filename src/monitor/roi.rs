//! Leveraged ROI calculation.
//!
//! Fees are charged on both legs at the same rate, so a position exactly at
//! its entry price always shows a small loss.

use crate::source::{Position, PositionSide};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::warn;

/// Full breakdown of a single ROI evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoiBreakdown {
    pub gross_pnl: Decimal,
    pub fees: Decimal,
    pub net_pnl: Decimal,
    pub notional: Decimal,
    /// Net PnL scaled by leverage, as a percentage of notional.
    pub roi_percent: Decimal,
}

impl RoiBreakdown {
    /// All-zero result for positions without a usable notional.
    pub const ZERO: RoiBreakdown = RoiBreakdown {
        gross_pnl: Decimal::ZERO,
        fees: Decimal::ZERO,
        net_pnl: Decimal::ZERO,
        notional: Decimal::ZERO,
        roi_percent: Decimal::ZERO,
    };
}

/// Compute ROI percentage and net PnL.
///
/// Returns `(roi_percent, net_pnl)`; see [`roi_breakdown`] for the
/// intermediate values.
pub fn roi(
    entry: Decimal,
    reference: Decimal,
    quantity: Decimal,
    side: PositionSide,
    leverage: Decimal,
    fee_rate: Decimal,
) -> (Decimal, Decimal) {
    let breakdown = roi_breakdown(entry, reference, quantity, side, leverage, fee_rate);
    (breakdown.roi_percent, breakdown.net_pnl)
}

/// Compute the full ROI breakdown.
///
/// A non-positive notional returns [`RoiBreakdown::ZERO`] instead of
/// dividing by zero. Zero leverage yields a zero ROI but keeps the PnL.
/// Inputs whose products leave the decimal range also yield
/// [`RoiBreakdown::ZERO`].
pub fn roi_breakdown(
    entry: Decimal,
    reference: Decimal,
    quantity: Decimal,
    side: PositionSide,
    leverage: Decimal,
    fee_rate: Decimal,
) -> RoiBreakdown {
    checked_roi_breakdown(entry, reference, quantity, side, leverage, fee_rate).unwrap_or_else(
        || {
            warn!(%entry, %reference, %quantity, %leverage, "ROI inputs overflow decimal range");
            RoiBreakdown::ZERO
        },
    )
}

/// Like [`roi_breakdown`], but `None` when any intermediate overflows.
pub fn checked_roi_breakdown(
    entry: Decimal,
    reference: Decimal,
    quantity: Decimal,
    side: PositionSide,
    leverage: Decimal,
    fee_rate: Decimal,
) -> Option<RoiBreakdown> {
    let notional = entry.checked_mul(quantity)?;
    if notional <= Decimal::ZERO {
        return Some(RoiBreakdown::ZERO);
    }

    let gross_pnl = match side {
        PositionSide::Long => reference.checked_sub(entry)?.checked_mul(quantity)?,
        PositionSide::Short => entry.checked_sub(reference)?.checked_mul(quantity)?,
    };

    let entry_fee = fee_rate.checked_mul(entry)?.checked_mul(quantity)?;
    let exit_fee = fee_rate.checked_mul(reference)?.checked_mul(quantity)?;
    let fees = entry_fee.checked_add(exit_fee)?;
    let net_pnl = gross_pnl.checked_sub(fees)?;
    let roi_percent = net_pnl
        .checked_mul(leverage)?
        .checked_div(notional)?
        .checked_mul(dec!(100))?;

    Some(RoiBreakdown {
        gross_pnl,
        fees,
        net_pnl,
        notional,
        roi_percent,
    })
}

/// Like [`position_roi`], but `None` when the position's values overflow.
pub fn checked_position_roi(position: &Position, fee_rate: Decimal) -> Option<RoiBreakdown> {
    checked_roi_breakdown(
        position.entry_price,
        position.reference_price,
        position.remaining_quantity,
        position.side,
        position.leverage,
        fee_rate,
    )
}

/// ROI of a snapshot position, priced at its reference price.
pub fn position_roi(position: &Position, fee_rate: Decimal) -> RoiBreakdown {
    roi_breakdown(
        position.entry_price,
        position.reference_price,
        position.remaining_quantity,
        position.side,
        position.leverage,
        fee_rate,
    )
}
