use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;

use crate::evaluator::{at, threshold, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "volume_spread_analysis";

/// Volume spread analysis on the last completed candle.
///
/// Sign of strength (bullish): a wide-spread, high-volume down bar that
/// closes in its upper half. Sign of weakness (bearish): a wide-spread,
/// high-volume up bar closing in its lower half.
pub struct VolumeSpreadAnalysis {
    descriptor: StrategyDescriptor,
    period: usize,
    volume_factor: f64,
}

impl VolumeSpreadAnalysis {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("period", Decimal::from(20))
            .with_param("volume_factor", Decimal::new(13, 1))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            period: descriptor.period_or("period", 20),
            volume_factor: threshold(&descriptor, "volume_factor", 1.3),
            descriptor,
        }
    }
}

impl StrategyEvaluator for VolumeSpreadAnalysis {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < self.period {
            return None;
        }
        let last = index - 1;
        let volume_ma = at(&frame.volume_sma(self.period), last)?;
        let spread_ma = at(&frame.spread_sma(self.period), last)?;

        let (open, high, low, close) = (
            frame.opens()[last],
            frame.highs()[last],
            frame.lows()[last],
            frame.closes()[last],
        );
        let spread = high - low;
        let midpoint = low + spread * 0.5;

        let high_volume = frame.volumes()[last] > volume_ma * self.volume_factor;
        let wide_spread = spread > spread_ma;
        if !(high_volume && wide_spread) {
            return None;
        }

        let fired = match frame.sentiment() {
            Sentiment::Bullish => close < open && close > midpoint,
            Sentiment::Bearish => close > open && close < midpoint,
        };
        fired.then(|| frame.sentiment().side())
    }
}
