//! Profit target rule.

use optdesk_core::events::Side;
use rust_decimal::Decimal;

/// Absolute target premium `percent` away from `entry`, in the position's
/// favour. A short target never goes below zero.
#[must_use]
pub fn target_premium(side: Side, entry: Decimal, percent: Decimal) -> Decimal {
    let distance = entry * percent / Decimal::ONE_HUNDRED;
    match side {
        Side::Long => entry + distance,
        Side::Short => (entry - distance).max(Decimal::ZERO),
    }
}

#[must_use]
pub fn target_reached(side: Side, target: Decimal, premium: Decimal) -> bool {
    match side {
        Side::Long => premium >= target,
        Side::Short => premium <= target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn target_levels() {
        assert_eq!(target_premium(Side::Long, dec!(100), dec!(50)), dec!(150));
        assert_eq!(target_premium(Side::Short, dec!(100), dec!(50)), dec!(50));
        assert_eq!(target_premium(Side::Short, dec!(100), dec!(150)), dec!(0));
    }

    #[test]
    fn reached_is_inclusive() {
        assert!(target_reached(Side::Long, dec!(150), dec!(150)));
        assert!(!target_reached(Side::Long, dec!(150), dec!(149.95)));
        assert!(target_reached(Side::Short, dec!(50), dec!(49)));
    }
}
