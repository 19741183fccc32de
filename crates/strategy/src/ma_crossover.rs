use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::evaluator::{at, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "ma_crossover";

/// Fast EMA crossing the slow EMA in the sentiment direction.
pub struct MaCrossover {
    descriptor: StrategyDescriptor,
    fast_period: usize,
    slow_period: usize,
}

impl MaCrossover {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("fast", Decimal::from(9))
            .with_param("slow", Decimal::from(21))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            fast_period: descriptor.period_or("fast", 9),
            slow_period: descriptor.period_or("slow", 21),
            descriptor,
        }
    }

    fn relation(fast: &[f64], slow: &[f64], index: usize) -> Option<Ordering> {
        at(fast, index)?.partial_cmp(&at(slow, index)?)
    }
}

impl StrategyEvaluator for MaCrossover {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.slow_period.max(1)
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < 1 {
            return None;
        }
        let fast = frame.ema(self.fast_period);
        let slow = frame.ema(self.slow_period);
        let last = Self::relation(&fast, &slow, index - 1)?;
        let current = Self::relation(&fast, &slow, index)?;

        // Only a change of relation counts as a cross
        let crossed = match frame.sentiment() {
            Sentiment::Bullish => last != Ordering::Greater && current == Ordering::Greater,
            Sentiment::Bearish => last != Ordering::Less && current == Ordering::Less,
        };
        crossed.then(|| frame.sentiment().side())
    }
}
