use optdesk_core::descriptor::StrategyId;
use optdesk_strategy::LibraryError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BacktestError {
    /// Every window failed, or there were no windows to run.
    #[error("insufficient data for {strategy}: {failed} of {total} windows failed")]
    InsufficientData {
        strategy: StrategyId,
        failed: usize,
        total: usize,
    },

    #[error("invalid window {index}: {reason}")]
    InvalidWindow { index: usize, reason: String },

    #[error("windows {first} and {second} overlap for {symbol}")]
    OverlappingWindows {
        symbol: String,
        first: usize,
        second: usize,
    },

    #[error(transparent)]
    Strategy(#[from] LibraryError),

    /// A worker task panicked or was cancelled.
    #[error("backtest worker failed: {0}")]
    Worker(String),
}

impl BacktestError {
    #[must_use]
    pub const fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }
}
