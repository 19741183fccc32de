//! Strategy identity and parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Registry key of a strategy (e.g. `cpr_breakout`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(String);

impl StrategyId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StrategyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Instrument class a strategy is meant to trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentClass {
    IndexOption,
    EquityOption,
}

/// Immutable description of a registered strategy.
///
/// Parameters live in an ordered map of `Decimal` values so that two
/// descriptors with the same settings hash and compare equal, which lets
/// descriptors key backtest result maps directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    id: StrategyId,
    params: BTreeMap<String, Decimal>,
    instrument_class: InstrumentClass,
}

impl StrategyDescriptor {
    #[must_use]
    pub fn new(id: impl Into<StrategyId>, instrument_class: InstrumentClass) -> Self {
        Self {
            id: id.into(),
            params: BTreeMap::new(),
            instrument_class,
        }
    }

    /// Adds or replaces a parameter. Builder-style, used before registration.
    #[must_use]
    pub fn with_param(mut self, name: &str, value: Decimal) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub const fn id(&self) -> &StrategyId {
        &self.id
    }

    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, Decimal> {
        &self.params
    }

    #[must_use]
    pub const fn instrument_class(&self) -> InstrumentClass {
        self.instrument_class
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<Decimal> {
        self.params.get(name).copied()
    }

    /// Parameter value or `default` when unset.
    #[must_use]
    pub fn param_or(&self, name: &str, default: Decimal) -> Decimal {
        self.param(name).unwrap_or(default)
    }

    /// Integer parameter (periods, lookbacks). Fractions are truncated and
    /// negatives fall back to `default`.
    #[must_use]
    pub fn period_or(&self, name: &str, default: usize) -> usize {
        use rust_decimal::prelude::ToPrimitive;
        self.param(name)
            .and_then(|v| v.trunc().to_usize())
            .filter(|v| *v > 0)
            .unwrap_or(default)
    }
}

impl From<String> for StrategyId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
