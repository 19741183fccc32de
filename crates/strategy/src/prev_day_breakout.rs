use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;

use crate::evaluator::{at, threshold, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "prev_day_breakout";

/// Close crossing the previous session's high (bullish) or low (bearish) on
/// above-average volume.
pub struct PrevDayBreakout {
    descriptor: StrategyDescriptor,
    volume_period: usize,
    volume_factor: f64,
}

impl PrevDayBreakout {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("volume_period", Decimal::from(20))
            .with_param("volume_factor", Decimal::new(12, 1))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            volume_period: descriptor.period_or("volume_period", 20),
            volume_factor: threshold(&descriptor, "volume_factor", 1.2),
            descriptor,
        }
    }
}

impl StrategyEvaluator for PrevDayBreakout {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.volume_period
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < 1 || index >= frame.len() {
            return None;
        }
        let volume_ma = at(&frame.volume_sma(self.volume_period), index)?;
        if frame.volumes()[index] <= volume_ma * self.volume_factor {
            return None;
        }

        let bars = frame.bars();
        let (close, prev_close) = (bars[index].close, bars[index - 1].close);
        let levels = frame.levels();

        let fired = match frame.sentiment() {
            Sentiment::Bullish => prev_close < levels.prev_high && close > levels.prev_high,
            Sentiment::Bearish => prev_close > levels.prev_low && close < levels.prev_low,
        };
        fired.then(|| frame.sentiment().side())
    }
}
