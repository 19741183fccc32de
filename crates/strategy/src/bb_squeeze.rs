use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::evaluator::{at, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "bb_squeeze_breakout";

/// Bollinger band breakout out of a squeeze (bandwidth below its own moving
/// average).
pub struct BbSqueezeBreakout {
    descriptor: StrategyDescriptor,
    period: usize,
    /// Band width in hundredths of a standard deviation.
    width: u32,
    bandwidth_ma_period: usize,
}

impl BbSqueezeBreakout {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("period", Decimal::from(20))
            .with_param("width", Decimal::from(2))
            .with_param("bandwidth_ma_period", Decimal::from(20))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        let width = descriptor
            .param("width")
            .and_then(|w| (w * Decimal::from(100)).round().to_u32())
            .filter(|w| *w > 0)
            .unwrap_or(200);
        Self {
            period: descriptor.period_or("period", 20),
            width,
            bandwidth_ma_period: descriptor.period_or("bandwidth_ma_period", 20),
            descriptor,
        }
    }
}

impl StrategyEvaluator for BbSqueezeBreakout {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.period + self.bandwidth_ma_period - 1
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < 1 {
            return None;
        }
        let bandwidth = at(&frame.bollinger_bandwidth(self.period, self.width), index)?;
        let bandwidth_ma = at(
            &frame.bandwidth_sma(self.period, self.width, self.bandwidth_ma_period),
            index,
        )?;
        if bandwidth >= bandwidth_ma {
            return None;
        }

        let closes = frame.closes();
        let (close, prev_close) = (*closes.get(index)?, closes[index - 1]);
        let fired = match frame.sentiment() {
            Sentiment::Bullish => {
                let upper = frame.bollinger_upper(self.period, self.width);
                prev_close < at(&upper, index - 1)? && close > at(&upper, index)?
            }
            Sentiment::Bearish => {
                let lower = frame.bollinger_lower(self.period, self.width);
                prev_close > at(&lower, index - 1)? && close < at(&lower, index)?
            }
        };
        fired.then(|| frame.sentiment().side())
    }
}
