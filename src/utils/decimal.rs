//! Decimal arithmetic utilities for financial calculations.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Round a decimal to a specific number of decimal places.
pub fn round_to_precision(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp(decimals)
}

/// Signed percentage change from `from` to `to` (e.g. 100 -> 110 = 10).
///
/// Zero when `from` is zero or the result is out of range.
pub fn percentage_change(from: Decimal, to: Decimal) -> Decimal {
    to.checked_sub(from)
        .and_then(|diff| diff.checked_div(from))
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .unwrap_or(Decimal::ZERO)
}

/// Safe division that returns zero if divisor is zero or the quotient overflows.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// Arithmetic mean; zero for an empty slice.
pub fn mean(values: &[Decimal]) -> Decimal {
    let sum = values
        .iter()
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(*v));
    safe_div(sum, Decimal::from(values.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_change() {
        assert_eq!(percentage_change(dec!(100), dec!(110)), dec!(10));
        assert_eq!(percentage_change(dec!(100), dec!(95)), dec!(-5));
        assert_eq!(percentage_change(Decimal::ZERO, dec!(5)), Decimal::ZERO);
        assert_eq!(
            percentage_change(dec!(0.0000000001), Decimal::MAX),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_safe_div() {
        assert_eq!(safe_div(dec!(10), dec!(4)), dec!(2.5));
        assert_eq!(safe_div(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_div(Decimal::MAX, dec!(0.0001)), Decimal::ZERO);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[dec!(1), dec!(2), dec!(6)]), dec!(3));
        assert_eq!(mean(&[]), Decimal::ZERO);
        assert_eq!(round_to_precision(dec!(49.5833), 2), dec!(49.58));
    }
}
