use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::events::{OrderId, Side};

/// Lifecycle state of a live position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionState {
    /// Decision made, entry order not yet fully filled.
    Pending,
    /// Entry filled, stop-loss and target active.
    Open,
    /// Exit order in flight.
    Closing,
    /// Exit filled. Terminal.
    Closed,
    /// Abandoned before any exposure was taken. Terminal.
    Cancelled,
}

impl PositionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Reason a position left the `Open` state (or never reached it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss,
    Target,
    ForcedFlatten,
    CancelRequested,
    EntryRejected(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopLoss => write!(f, "stop_loss"),
            Self::Target => write!(f, "target"),
            Self::ForcedFlatten => write!(f, "forced_flatten"),
            Self::CancelRequested => write!(f, "cancel_requested"),
            Self::EntryRejected(reason) => write!(f, "entry_rejected: {reason}"),
        }
    }
}

/// A single trade's authoritative state. Owned by the position state machine;
/// everything else sees clones.
///
/// `stop_loss_premium` and `target_premium` are absolute option premiums
/// derived from the average entry premium, never from the underlying's price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub side: Side,
    /// Contracts requested by the entry order.
    pub quantity: u32,
    /// Contracts filled so far on the entry order.
    pub filled_quantity: u32,
    pub entry_premium: Option<Decimal>,
    /// Contracts filled so far on the exit order.
    pub exit_filled_quantity: u32,
    pub exit_premium: Option<Decimal>,
    pub stop_loss_premium: Option<Decimal>,
    pub target_premium: Option<Decimal>,
    pub state: PositionState,
    pub entry_order: Option<OrderId>,
    pub exit_order: Option<OrderId>,
    pub commissions: Decimal,
    pub realized_pnl: Option<Decimal>,
    pub close_reason: Option<CloseReason>,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    #[must_use]
    pub fn pending(
        instrument: impl Into<String>,
        side: Side,
        quantity: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            quantity,
            filled_quantity: 0,
            entry_premium: None,
            exit_filled_quantity: 0,
            exit_premium: None,
            stop_loss_premium: None,
            target_premium: None,
            state: PositionState::Pending,
            entry_order: None,
            exit_order: None,
            commissions: Decimal::ZERO,
            realized_pnl: None,
            close_reason: None,
            created_at,
            opened_at: None,
            closed_at: None,
        }
    }

    /// Contracts still to be closed by the exit order.
    #[must_use]
    pub fn exit_remaining(&self) -> u32 {
        self.filled_quantity.saturating_sub(self.exit_filled_quantity)
    }

    /// Mark-to-market P/L at `premium`, before commissions.
    #[must_use]
    pub fn unrealized_pnl(&self, premium: Decimal) -> Option<Decimal> {
        self.entry_premium.map(|entry| {
            (premium - entry) * Decimal::from(self.filled_quantity) * self.side.sign()
        })
    }
}

/// Volume-weighted average after adding `qty` at `price` to `prev_qty` at `prev_avg`.
#[must_use]
pub fn weighted_average(prev_avg: Option<Decimal>, prev_qty: u32, price: Decimal, qty: u32) -> Decimal {
    let total = prev_qty + qty;
    if total == 0 {
        return price;
    }
    let prev_notional = prev_avg.unwrap_or(Decimal::ZERO) * Decimal::from(prev_qty);
    (prev_notional + price * Decimal::from(qty)) / Decimal::from(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn weighted_average_blends_partial_fills() {
        let avg = weighted_average(None, 0, dec!(100), 25);
        assert_eq!(avg, dec!(100));
        let avg = weighted_average(Some(avg), 25, dec!(104), 75);
        assert_eq!(avg, dec!(103));
    }

    #[test]
    fn unrealized_pnl_respects_side() {
        let mut pos = Position::pending("BANKNIFTY24DEC51000PE", Side::Short, 30, Utc::now());
        pos.filled_quantity = 30;
        pos.entry_premium = Some(dec!(200));
        assert_eq!(pos.unrealized_pnl(dec!(180)), Some(dec!(600)));
    }
}
