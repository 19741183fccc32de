//! Stop-loss rule and the combined exit check.

use optdesk_core::events::Side;
use optdesk_core::position::{CloseReason, Position};
use rust_decimal::Decimal;

use crate::targets;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Absolute stop premium `percent` away from `entry`, against the position.
#[must_use]
pub fn stop_loss_premium(side: Side, entry: Decimal, percent: Decimal) -> Decimal {
    match side {
        Side::Long => entry * (HUNDRED - percent) / HUNDRED,
        Side::Short => entry * (HUNDRED + percent) / HUNDRED,
    }
}

#[must_use]
pub fn stop_breached(side: Side, stop: Decimal, premium: Decimal) -> bool {
    match side {
        Side::Long => premium <= stop,
        Side::Short => premium >= stop,
    }
}

/// Checks an open position against `premium`. Stops are checked first.
#[must_use]
pub fn check_exit_rules(pos: &Position, premium: Decimal) -> Option<CloseReason> {
    if let Some(stop) = pos.stop_loss_premium {
        if stop_breached(pos.side, stop, premium) {
            tracing::warn!(
                instrument = %pos.instrument,
                premium = %premium,
                stop = %stop,
                "Stop loss triggered"
            );
            return Some(CloseReason::StopLoss);
        }
    }

    if let Some(target) = pos.target_premium {
        if targets::target_reached(pos.side, target, premium) {
            tracing::info!(
                instrument = %pos.instrument,
                premium = %premium,
                target = %target,
                "Target reached"
            );
            return Some(CloseReason::Target);
        }
    }
    None
}
