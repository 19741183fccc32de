//! Types for live position management.

use optdesk_core::config::{ExecutionConfig, TradingConfig};
use optdesk_core::error::BrokerError;
use optdesk_core::events::{
    FillEvent, OrderId, OrderIntent, OrderType, OrderUpdate, QuoteTick, Side,
};
use optdesk_core::position::{Position, PositionState};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stop, target and exit-order settings for one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRules {
    pub stop_loss_percent: Decimal,
    pub target_percent: Decimal,
    pub exit_order_type: OrderType,
}

impl From<&TradingConfig> for ExitRules {
    fn from(config: &TradingConfig) -> Self {
        Self {
            stop_loss_percent: config.stop_loss_percent,
            target_percent: config.target_percent,
            exit_order_type: config.exit_order_type,
        }
    }
}

/// Order retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra entry attempts after the first.
    pub entry_retries: u32,
    /// Extra exit attempts after the first.
    pub exit_retries: u32,
    pub exit_backoff_ms: u64,
}

impl From<&ExecutionConfig> for RetryPolicy {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            entry_retries: config.entry_retry_limit,
            exit_retries: config.exit_retry_limit,
            exit_backoff_ms: config.exit_retry_backoff_ms,
        }
    }
}

/// The entry the service opens a position with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRequest {
    pub instrument: String,
    pub side: Side,
    pub quantity: u32,
    /// Market order when `None`.
    pub limit_price: Option<Decimal>,
}

impl EntryRequest {
    #[must_use]
    pub fn market(instrument: impl Into<String>, side: Side, quantity: u32) -> Self {
        Self {
            instrument: instrument.into(),
            side,
            quantity,
            limit_price: None,
        }
    }

    #[must_use]
    pub fn intent(&self) -> OrderIntent {
        let side = self.side.entry_order_side();
        match self.limit_price {
            Some(price) => OrderIntent::limit(&self.instrument, side, self.quantity, price),
            None => OrderIntent::market(&self.instrument, side, self.quantity),
        }
    }
}

/// Input to the position state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionEvent {
    Fill(FillEvent),
    Quote(QuoteTick),
    Order(OrderUpdate),
    /// Entry could not be placed at all.
    EntryFailed(String),
    FlattenDeadline,
    CancelRequested,
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionAction {
    SubmitExit(OrderIntent),
    CancelOrder(OrderId),
    /// The position reached a terminal state.
    Report(Position),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("cancel not permitted while {state}")]
    CancelNotPermitted { state: PositionState },

    /// The position is left in `Closing`; manual intervention is needed.
    #[error("exit order failed after {attempts} attempts: {last}")]
    ExitRetriesExhausted { attempts: u32, last: BrokerError },

    #[error("broker feed unavailable: {0}")]
    Feed(#[from] BrokerError),

    #[error("broker feeds closed while position {state}")]
    FeedClosed { state: PositionState },
}
