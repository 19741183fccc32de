//! Pre-market inputs of the daily cycle.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::descriptor::StrategyDescriptor;
use crate::error::ConfigError;

/// Typed market signals assembled before the open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyContext {
    pub date: NaiveDate,
    pub symbol: String,
    pub vix: Option<Decimal>,
    /// Economic-calendar flags (e.g. `"rbi_policy"`).
    pub calendar_flags: Vec<String>,
    /// Named indicator readings from the context collaborator.
    pub indicators: BTreeMap<String, Decimal>,
}

impl DailyContext {
    #[must_use]
    pub fn new(date: NaiveDate, symbol: impl Into<String>) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            vix: None,
            calendar_flags: Vec::new(),
            indicators: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_vix(mut self, vix: Decimal) -> Self {
        self.vix = Some(vix);
        self
    }

    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.calendar_flags.push(flag.into());
        self
    }
}

/// Candidate strategy suggested by the recommendation agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    descriptor: StrategyDescriptor,
    rationale: String,
    confidence: f64,
}

impl Recommendation {
    /// # Errors
    ///
    /// Returns an error if `confidence` is outside [0, 1] or not a number.
    pub fn new(
        descriptor: StrategyDescriptor,
        rationale: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ConfigError::new(
                "recommendation.confidence",
                format!("{confidence} is outside [0, 1]"),
            ));
        }
        Ok(Self {
            descriptor,
            rationale: rationale.into(),
            confidence,
        })
    }

    #[must_use]
    pub const fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }
}
