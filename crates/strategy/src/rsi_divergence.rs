use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;

use crate::evaluator::StrategyEvaluator;
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "rsi_divergence";

/// Price makes a new extreme over the lookback while RSI does not.
///
/// Bullish: the current low is below every earlier low in the lookback while
/// RSI is above its lookback minimum. Bearish mirrors it on highs.
pub struct RsiDivergence {
    descriptor: StrategyDescriptor,
    rsi_period: usize,
    lookback: usize,
}

impl RsiDivergence {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("rsi_period", Decimal::from(14))
            .with_param("lookback", Decimal::from(30))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            rsi_period: descriptor.period_or("rsi_period", 14),
            lookback: descriptor.period_or("lookback", 30).max(2),
            descriptor,
        }
    }
}

fn finite(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

impl StrategyEvaluator for RsiDivergence {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.rsi_period + 1
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index >= frame.len() {
            return None;
        }
        let start = (index + 1).saturating_sub(self.lookback);
        let rsi = frame.rsi(self.rsi_period);
        let current_rsi = rsi[index];
        if current_rsi.is_nan() || index == start {
            return None;
        }
        let prior_rsi = &rsi[start..index];

        let fired = match frame.sentiment() {
            Sentiment::Bullish => {
                let lows = &frame.lows()[start..=index];
                let prior_low = finite(&lows[..lows.len() - 1]).fold(f64::INFINITY, f64::min);
                let rsi_floor = finite(prior_rsi).fold(f64::INFINITY, f64::min);
                lows[lows.len() - 1] < prior_low && rsi_floor.is_finite() && current_rsi > rsi_floor
            }
            Sentiment::Bearish => {
                let highs = &frame.highs()[start..=index];
                let prior_high = finite(&highs[..highs.len() - 1]).fold(f64::NEG_INFINITY, f64::max);
                let rsi_ceiling = finite(prior_rsi).fold(f64::NEG_INFINITY, f64::max);
                highs[highs.len() - 1] > prior_high
                    && rsi_ceiling.is_finite()
                    && current_rsi < rsi_ceiling
            }
        };
        fired.then(|| frame.sentiment().side())
    }
}
