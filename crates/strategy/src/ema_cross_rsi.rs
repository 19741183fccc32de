use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;

use crate::evaluator::{at, threshold, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "ema_cross_rsi";

/// Fast/slow EMA cross (9/15 by default) confirmed by RSI on the signal
/// candle and the close holding beyond the fast EMA.
pub struct EmaCrossRsi {
    descriptor: StrategyDescriptor,
    fast: usize,
    slow: usize,
    rsi_period: usize,
    rsi_level: f64,
}

impl EmaCrossRsi {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("fast", Decimal::from(9))
            .with_param("slow", Decimal::from(15))
            .with_param("rsi_period", Decimal::from(14))
            .with_param("rsi_level", Decimal::from(50))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            fast: descriptor.period_or("fast", 9),
            slow: descriptor.period_or("slow", 15),
            rsi_period: descriptor.period_or("rsi_period", 14),
            rsi_level: threshold(&descriptor, "rsi_level", 50.0),
            descriptor,
        }
    }
}

impl StrategyEvaluator for EmaCrossRsi {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.slow.max(2)
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < 2 {
            return None;
        }
        let fast = frame.ema(self.fast);
        let slow = frame.ema(self.slow);
        let (f0, s0) = (at(&fast, index - 1)?, at(&slow, index - 1)?);
        let (f1, s1) = (at(&fast, index)?, at(&slow, index)?);
        let rsi = at(&frame.rsi(self.rsi_period), index)?;
        let close = *frame.closes().get(index)?;

        let fired = match frame.sentiment() {
            Sentiment::Bullish => f0 < s0 && f1 > s1 && rsi > self.rsi_level && close > f1,
            Sentiment::Bearish => f0 > s0 && f1 < s1 && rsi < self.rsi_level && close < f1,
        };
        fired.then(|| frame.sentiment().side())
    }
}
