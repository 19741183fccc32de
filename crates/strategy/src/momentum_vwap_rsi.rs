use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;

use crate::evaluator::{at, threshold, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "momentum_vwap_rsi";

/// Close on the sentiment side of session VWAP with RSI momentum.
pub struct MomentumVwapRsi {
    descriptor: StrategyDescriptor,
    rsi_period: usize,
    rsi_bull: f64,
    rsi_bear: f64,
}

impl MomentumVwapRsi {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("rsi_period", Decimal::from(14))
            .with_param("rsi_bull", Decimal::from(55))
            .with_param("rsi_bear", Decimal::from(45))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            rsi_period: descriptor.period_or("rsi_period", 14),
            rsi_bull: threshold(&descriptor, "rsi_bull", 55.0),
            rsi_bear: threshold(&descriptor, "rsi_bear", 45.0),
            descriptor,
        }
    }
}

impl StrategyEvaluator for MomentumVwapRsi {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.rsi_period
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < 1 {
            return None;
        }
        let vwap = at(&frame.vwap(), index)?;
        let rsi = at(&frame.rsi(self.rsi_period), index)?;
        let close = *frame.closes().get(index)?;

        let fired = match frame.sentiment() {
            Sentiment::Bullish => close > vwap && rsi > self.rsi_bull,
            Sentiment::Bearish => close < vwap && rsi < self.rsi_bear,
        };
        fired.then(|| frame.sentiment().side())
    }
}
