//! Type definitions for the engine's position API.

use crate::error::{WatchError, WatchResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a leveraged position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    #[serde(alias = "long", alias = "Long")]
    Long,
    #[serde(alias = "short", alias = "Short")]
    Short,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// An open position as reported by the engine.
///
/// The engine calls the reference price `highest_price` and the quantity
/// `remaining_qty`; both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: Decimal,
    #[serde(alias = "highest_price")]
    pub reference_price: Decimal,
    #[serde(alias = "remaining_qty")]
    pub remaining_quantity: Decimal,
    pub leverage: Decimal,
    /// Strategy label; empty when the engine omits it.
    #[serde(default)]
    pub mode: String,
}

impl Position {
    /// Parse and validate a single raw snapshot record.
    pub fn from_value(symbol: &str, value: &serde_json::Value) -> WatchResult<Self> {
        let position: Position =
            serde_json::from_value(value.clone()).map_err(|e| WatchError::MalformedResponse {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
        position.validate()?;
        Ok(position)
    }

    fn validate(&self) -> WatchResult<()> {
        let checks = [
            ("entry_price", self.entry_price),
            ("reference_price", self.reference_price),
            ("remaining_quantity", self.remaining_quantity),
            ("leverage", self.leverage),
        ];

        for (field, value) in checks {
            if value < Decimal::ZERO {
                return Err(WatchError::MalformedResponse {
                    symbol: self.symbol.clone(),
                    reason: format!("{} is negative ({})", field, value),
                });
            }
        }

        for (field, price) in [
            ("entry_price", self.entry_price),
            ("reference_price", self.reference_price),
        ] {
            if price.checked_mul(self.remaining_quantity).is_none() {
                return Err(WatchError::MalformedResponse {
                    symbol: self.symbol.clone(),
                    reason: format!("{} * remaining_quantity overflows", field),
                });
            }
        }

        Ok(())
    }

    /// Unleveraged size at entry, saturating at the decimal range.
    pub fn notional(&self) -> Decimal {
        self.entry_price.saturating_mul(self.remaining_quantity)
    }
}

/// Raw response of the positions endpoint.
///
/// Records are kept as raw JSON so that one malformed entry for an
/// unrelated symbol cannot hide the tracked one.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub positions: Vec<serde_json::Value>,
    #[serde(default)]
    pub count: Option<usize>,
}

/// A point-in-time view of all open positions.
#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<serde_json::Value>,
}

impl PositionSnapshot {
    pub fn new(records: Vec<serde_json::Value>) -> Self {
        Self {
            fetched_at: Utc::now(),
            records,
        }
    }

    /// Build a snapshot from already-typed positions.
    pub fn from_positions(positions: &[Position]) -> Self {
        let records = positions
            .iter()
            .filter_map(|p| serde_json::to_value(p).ok())
            .collect();
        Self::new(records)
    }

    /// Locate the first record for `symbol` and validate it.
    ///
    /// `None` means the symbol is not open. `Some(Err(..))` means it is
    /// listed but unusable.
    pub fn find(&self, symbol: &str) -> Option<WatchResult<Position>> {
        self.records
            .iter()
            .find(|record| record.get("symbol").and_then(|s| s.as_str()) == Some(symbol))
            .map(|record| Position::from_value(symbol, record))
    }

    /// Parse every record, returning the valid positions and the number skipped.
    pub fn parse_all(&self) -> (Vec<Position>, usize) {
        let mut positions = Vec::with_capacity(self.records.len());
        let mut skipped = 0;

        for record in &self.records {
            let symbol = record
                .get("symbol")
                .and_then(|s| s.as_str())
                .unwrap_or("<unknown>");
            match Position::from_value(symbol, record) {
                Ok(position) => positions.push(position),
                Err(_) => skipped += 1,
            }
        }

        (positions, skipped)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<PositionsResponse> for PositionSnapshot {
    fn from(response: PositionsResponse) -> Self {
        Self::new(response.positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_deserialize_engine_position() {
        let value = json!({
            "symbol": "SQDUSDT",
            "side": "LONG",
            "mode": "swing",
            "entry_price": 0.1234,
            "original_qty": 1000.0,
            "remaining_qty": 800.0,
            "leverage": 10,
            "highest_price": 0.1301,
            "lowest_price": 0.1200,
            "trailing_active": false
        });

        let position = Position::from_value("SQDUSDT", &value).unwrap();
        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.entry_price, dec!(0.1234));
        assert_eq!(position.reference_price, dec!(0.1301));
        assert_eq!(position.remaining_quantity, dec!(800));
        assert_eq!(position.leverage, dec!(10));
        assert_eq!(position.mode, "swing");
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let value = json!({
            "symbol": "SQDUSDT",
            "side": "LONG",
            "highest_price": 0.13,
            "remaining_qty": 800,
            "leverage": 10
        });

        match Position::from_value("SQDUSDT", &value) {
            Err(WatchError::MalformedResponse { symbol, reason }) => {
                assert_eq!(symbol, "SQDUSDT");
                assert!(reason.contains("entry_price"));
            }
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_quantity_is_malformed() {
        let value = json!({
            "symbol": "BTCUSDT",
            "side": "SHORT",
            "entry_price": "50000",
            "reference_price": "49000",
            "remaining_quantity": "-1",
            "leverage": "5",
            "mode": "scalp"
        });

        assert!(matches!(
            Position::from_value("BTCUSDT", &value),
            Err(WatchError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_oversized_position_is_malformed() {
        let value = json!({
            "symbol": "BTCUSDT",
            "side": "LONG",
            "entry_price": "100000000000000",
            "highest_price": "100000000000000",
            "remaining_qty": "1000000000000000",
            "leverage": "5",
            "mode": "swing"
        });

        match Position::from_value("BTCUSDT", &value) {
            Err(WatchError::MalformedResponse { reason, .. }) => {
                assert!(reason.contains("overflows"))
            }
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_find_ignores_unrelated_garbage() {
        let snapshot = PositionSnapshot::new(vec![
            json!({ "symbol": "ETHUSDT", "side": 42 }),
            json!({
                "symbol": "BTCUSDT",
                "side": "SHORT",
                "entry_price": 50000,
                "highest_price": 49000,
                "remaining_qty": 0.1,
                "leverage": 5,
                "mode": "scalp"
            }),
        ]);

        let btc = snapshot.find("BTCUSDT").unwrap().unwrap();
        assert_eq!(btc.side, PositionSide::Short);
        assert!(snapshot.find("ETHUSDT").unwrap().is_err());
        assert!(snapshot.find("SOLUSDT").is_none());

        let (valid, skipped) = snapshot.parse_all();
        assert_eq!(valid.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_snapshot_first_match_wins() {
        let snapshot = PositionSnapshot::new(vec![
            json!({
                "symbol": "BTCUSDT", "side": "LONG", "entry_price": 100,
                "highest_price": 101, "remaining_qty": 1, "leverage": 2, "mode": "swing"
            }),
            json!({
                "symbol": "BTCUSDT", "side": "SHORT", "entry_price": 200,
                "highest_price": 190, "remaining_qty": 1, "leverage": 2, "mode": "swing"
            }),
        ]);

        let first = snapshot.find("BTCUSDT").unwrap().unwrap();
        assert_eq!(first.entry_price, dec!(100));
    }
}
