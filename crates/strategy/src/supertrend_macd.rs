use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::evaluator::{at, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "supertrend_macd";

/// Trend follower: Supertrend pointing with the sentiment and the MACD line
/// on the same side of its signal line.
pub struct SupertrendMacd {
    descriptor: StrategyDescriptor,
    atr_period: usize,
    /// Band multiplier in hundredths of an ATR.
    multiplier: u32,
    fast: usize,
    slow: usize,
    signal: usize,
}

impl SupertrendMacd {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("atr_period", Decimal::from(7))
            .with_param("multiplier", Decimal::from(3))
            .with_param("fast", Decimal::from(12))
            .with_param("slow", Decimal::from(26))
            .with_param("signal", Decimal::from(9))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        let multiplier = descriptor
            .param("multiplier")
            .and_then(|m| (m * Decimal::from(100)).round().to_u32())
            .filter(|m| *m > 0)
            .unwrap_or(300);
        Self {
            atr_period: descriptor.period_or("atr_period", 7),
            multiplier,
            fast: descriptor.period_or("fast", 12),
            slow: descriptor.period_or("slow", 26),
            signal: descriptor.period_or("signal", 9),
            descriptor,
        }
    }
}

impl StrategyEvaluator for SupertrendMacd {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        (self.slow + self.signal - 1).max(self.atr_period + 1)
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < 1 {
            return None;
        }
        let direction = at(&frame.supertrend(self.atr_period, self.multiplier), index)?;
        let line = at(&frame.macd_line(self.fast, self.slow), index)?;
        let signal = at(&frame.macd_signal(self.fast, self.slow, self.signal), index)?;

        let fired = match frame.sentiment() {
            Sentiment::Bullish => direction > 0.0 && line > signal,
            Sentiment::Bearish => direction < 0.0 && line < signal,
        };
        fired.then(|| frame.sentiment().side())
    }
}
