use chrono::{FixedOffset, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::events::{BarInterval, OrderType};

/// Immutable application configuration, passed into constructors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub trading: TradingConfig,
    pub backtest: BacktestConfig,
    pub selection: SelectionConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// Stop-loss distance from entry premium, in percent (e.g. 30 = 30%).
    pub stop_loss_percent: Decimal,
    /// Target distance from entry premium, in percent.
    pub target_percent: Decimal,
    /// Orders go to the paper broker; `false` is refused since no live
    /// transport exists.
    pub paper_trading: bool,
    /// `market`, or `limit` at the triggering tick's premium.
    pub exit_order_type: OrderType,
    /// Local wall-clock cutoff, `HH:MM`.
    pub flatten_time: String,
    /// Exchange local time offset from UTC.
    pub timezone_offset_minutes: i32,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            stop_loss_percent: Decimal::from(30),
            target_percent: Decimal::from(50),
            paper_trading: true,
            exit_order_type: OrderType::Market,
            flatten_time: "15:15".to_string(),
            // IST
            timezone_offset_minutes: 330,
        }
    }
}

impl TradingConfig {
    /// Parsed flatten cutoff.
    ///
    /// # Errors
    ///
    /// Returns an error if `flatten_time` is not `HH:MM`.
    pub fn flatten_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(&self.flatten_time, "%H:%M")
            .map_err(|e| ConfigError::new("trading.flatten_time", e.to_string()))
    }

    /// Exchange-local offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset is out of range (more than a day).
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.timezone_offset_minutes * 60).ok_or_else(|| {
            ConfigError::new(
                "trading.timezone_offset_minutes",
                format!("{} is out of range", self.timezone_offset_minutes),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest_years: u32,
    /// Worker pool size. 0 selects the machine's available parallelism.
    pub concurrency_level: usize,
    pub bar_interval: BarInterval,
    pub symbol: String,
    pub allow_overlap: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            backtest_years: 2,
            concurrency_level: 0,
            bar_interval: BarInterval::Minute5,
            symbol: "NIFTY 50".to_string(),
            allow_overlap: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum win rate in [0, 1].
    pub win_rate_threshold: f64,
    pub min_trades: usize,
    /// Strategy ids backtested alongside the recommendation as fallbacks.
    pub competitors: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            win_rate_threshold: 0.55,
            min_trades: 20,
            competitors: vec!["cpr_breakout".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Premium points the day is allowed to lose, across all lots.
    pub risk_budget: Decimal,
    pub lot_size: u32,
    pub max_lots: u32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_budget: Decimal::from(5000),
            lot_size: 25,
            max_lots: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub entry_retry_limit: u32,
    pub exit_retry_limit: u32,
    pub exit_retry_backoff_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            entry_retry_limit: 2,
            exit_retry_limit: 10,
            exit_retry_backoff_ms: 250,
        }
    }
}

impl AppConfig {
    /// Rejects values no part of the system can work with.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trading;
        if t.stop_loss_percent <= Decimal::ZERO || t.stop_loss_percent >= Decimal::from(100) {
            return Err(ConfigError::new(
                "trading.stop_loss_percent",
                "must be in (0, 100)",
            ));
        }
        if t.target_percent <= Decimal::ZERO {
            return Err(ConfigError::new("trading.target_percent", "must be positive"));
        }
        t.flatten_time()?;
        t.offset()?;

        if self.backtest.backtest_years == 0 {
            return Err(ConfigError::new("backtest.backtest_years", "must be at least 1"));
        }
        if self.backtest.symbol.trim().is_empty() {
            return Err(ConfigError::new("backtest.symbol", "must not be empty"));
        }

        if !(0.0..=1.0).contains(&self.selection.win_rate_threshold) {
            return Err(ConfigError::new(
                "selection.win_rate_threshold",
                "must be in [0, 1]",
            ));
        }

        if self.risk.risk_budget <= Decimal::ZERO {
            return Err(ConfigError::new("risk.risk_budget", "must be positive"));
        }
        if self.risk.lot_size == 0 {
            return Err(ConfigError::new("risk.lot_size", "must be positive"));
        }
        if self.risk.max_lots == 0 {
            return Err(ConfigError::new("risk.max_lots", "must be at least 1"));
        }

        if self.execution.exit_retry_limit == 0 {
            return Err(ConfigError::new(
                "execution.exit_retry_limit",
                "must allow at least one attempt",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_threshold_outside_unit_interval() {
        let mut config = AppConfig::default();
        config.selection.win_rate_threshold = 60.0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "selection.win_rate_threshold");
    }

    #[test]
    fn rejects_stop_of_full_premium() {
        let mut config = AppConfig::default();
        config.trading.stop_loss_percent = dec!(100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_flatten_time() {
        let t = TradingConfig::default();
        assert_eq!(
            t.flatten_time().unwrap(),
            NaiveTime::from_hms_opt(15, 15, 0).unwrap()
        );

        let bad = TradingConfig {
            flatten_time: "3pm".to_string(),
            ..TradingConfig::default()
        };
        assert!(bad.flatten_time().is_err());
    }

    #[test]
    fn deserializes_partial_sections() {
        let json = r#"{"risk": {"lot_size": 15}, "trading": {"exit_order_type": "limit"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.risk.lot_size, 15);
        assert_eq!(config.risk.max_lots, 4);
        assert_eq!(config.trading.exit_order_type, OrderType::Limit);
    }
}
