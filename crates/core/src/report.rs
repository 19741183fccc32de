//! Immutable records produced by a backtest run.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::descriptor::StrategyId;
use crate::events::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeOutcome {
    Win,
    Loss,
    Breakeven,
}

impl TradeOutcome {
    /// Classifies a P/L value. Zero is breakeven.
    #[must_use]
    pub fn from_pnl(pnl: Decimal) -> Self {
        if pnl > Decimal::ZERO {
            Self::Win
        } else if pnl < Decimal::ZERO {
            Self::Loss
        } else {
            Self::Breakeven
        }
    }
}

/// Why a simulated trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExitReason {
    /// Strategy exit signal.
    Signal,
    /// Flattened at the last bar of the session.
    SessionEnd,
}

/// One simulated trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSimResult {
    /// Index of the window (in the caller's window list) that produced it.
    pub window: usize,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub outcome: TradeOutcome,
    /// Premium points gained or lost per unit.
    pub pnl: Decimal,
}

impl TradeSimResult {
    /// Builds a closed trade; outcome and P/L derive from side and prices.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn close(
        window: usize,
        symbol: &str,
        side: Side,
        entry_price: Decimal,
        entry_time: DateTime<Utc>,
        exit_price: Decimal,
        exit_time: DateTime<Utc>,
        exit_reason: ExitReason,
    ) -> Self {
        let pnl = (exit_price - entry_price) * side.sign();
        Self {
            window,
            symbol: symbol.to_string(),
            side,
            entry_price,
            exit_price,
            entry_time,
            exit_time,
            exit_reason,
            outcome: TradeOutcome::from_pnl(pnl),
            pnl,
        }
    }
}

/// Aggregate statistics for one strategy over a set of windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy: StrategyId,
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    /// wins / trade_count; breakevens count in the denominator only.
    pub win_rate: f64,
    pub total_pnl: Decimal,
    pub average_pnl: Decimal,
    /// Largest peak-to-trough decline of cumulative P/L, in premium points.
    pub max_drawdown: Decimal,
    pub windows_evaluated: usize,
    pub windows_failed: usize,
    pub warnings: Vec<String>,
}

impl BacktestReport {
    #[must_use]
    pub fn meets(&self, threshold: f64, min_trades: usize) -> bool {
        self.win_rate >= threshold && self.trade_count >= min_trades
    }
}
