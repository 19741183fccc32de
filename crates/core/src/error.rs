//! Error types shared by the capability traits.

use thiserror::Error;

/// Failures of the historical data provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// Nothing could be fetched for the requested range.
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Data was returned but failed validation.
    #[error("corrupt data for {symbol}: {reason}")]
    Corrupt { symbol: String, reason: String },
}

impl DataError {
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn corrupt(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

/// Failures of the broker transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The broker refused the order.
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// Broker session unreachable or timed out.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// Order id not known to the broker.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// No quote is available to price a paper fill.
    #[error("no quote for {0}")]
    NoQuote(String),
}

impl BrokerError {
    /// Returns true if resubmitting the same order may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::BrokerUnavailable(_) | Self::NoQuote(_))
    }
}

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid config `{field}`: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}
