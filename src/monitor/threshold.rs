//! Mode-dependent ROI thresholds for early profit booking.

use crate::config::WatchConfig;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Immutable mapping from trading mode to required ROI percentage.
///
/// Lookups never fail: unknown modes get the default. Mode labels and
/// symbols are normalized so `"SWING"` and `"swing"` resolve the same.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    by_mode: HashMap<String, Decimal>,
    default: Decimal,
    symbol_overrides: HashMap<String, Decimal>,
}

impl ThresholdPolicy {
    pub fn new(by_mode: HashMap<String, Decimal>, default: Decimal) -> Self {
        Self {
            by_mode: by_mode
                .into_iter()
                .map(|(mode, pct)| (normalize(&mode), pct))
                .collect(),
            default,
            symbol_overrides: HashMap::new(),
        }
    }

    /// Add per-symbol custom targets. Non-positive values are ignored,
    /// matching the engine's "0 = use mode default" convention.
    pub fn with_symbol_overrides(mut self, overrides: HashMap<String, Decimal>) -> Self {
        self.symbol_overrides = overrides
            .into_iter()
            .filter(|(_, pct)| *pct > Decimal::ZERO)
            .map(|(symbol, pct)| (symbol.trim().to_uppercase(), pct))
            .collect();
        self
    }

    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.threshold_by_mode.clone(), config.default_threshold)
            .with_symbol_overrides(config.symbol_overrides.clone())
    }

    /// Required ROI percentage for a trading mode.
    pub fn threshold_for(&self, mode: &str) -> Decimal {
        self.by_mode
            .get(&normalize(mode))
            .copied()
            .unwrap_or(self.default)
    }

    /// Required ROI percentage for a specific position: a symbol override
    /// wins over the mode table.
    pub fn threshold_for_position(&self, symbol: &str, mode: &str) -> Decimal {
        self.symbol_overrides
            .get(&symbol.trim().to_uppercase())
            .copied()
            .unwrap_or_else(|| self.threshold_for(mode))
    }

    pub fn default_threshold(&self) -> Decimal {
        self.default
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::from_config(&WatchConfig::default())
    }
}

fn normalize(mode: &str) -> String {
    mode.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_known_modes_return_exact_values() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.threshold_for("ultra_fast"), dec!(3));
        assert_eq!(policy.threshold_for("scalp"), dec!(5));
        assert_eq!(policy.threshold_for("swing"), dec!(8));
        assert_eq!(policy.threshold_for("position"), dec!(10));
    }

    #[test]
    fn test_unknown_mode_falls_back_to_default() {
        let policy = ThresholdPolicy::new(
            HashMap::from([("scalp".to_string(), dec!(5))]),
            dec!(7.5),
        );
        assert_eq!(policy.threshold_for("swing"), dec!(7.5));
        assert_eq!(policy.threshold_for(""), dec!(7.5));
        assert_eq!(policy.threshold_for("scalp"), dec!(5));
        assert_eq!(policy.default_threshold(), dec!(7.5));
    }

    #[test]
    fn test_mode_lookup_is_case_insensitive() {
        let policy = ThresholdPolicy::new(HashMap::from([("Swing".to_string(), dec!(8))]), dec!(1));
        assert_eq!(policy.threshold_for("SWING"), dec!(8));
        assert_eq!(policy.threshold_for(" swing "), dec!(8));
    }

    #[test]
    fn test_symbol_override_wins() {
        let policy = ThresholdPolicy::default().with_symbol_overrides(HashMap::from([
            ("sqdusdt".to_string(), dec!(12)),
            ("BTCUSDT".to_string(), Decimal::ZERO),
        ]));

        assert_eq!(policy.threshold_for_position("SQDUSDT", "swing"), dec!(12));
        // Zero override means "use the mode default"
        assert_eq!(policy.threshold_for_position("BTCUSDT", "scalp"), dec!(5));
        assert_eq!(policy.threshold_for_position("ETHUSDT", "unknown"), dec!(8));
    }
}
