use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;

use crate::evaluator::{at, threshold, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "volatility_cluster_reversal";

/// Reversal after a large counter-trend candle in a high-volatility regime.
///
/// Reads the last completed candle (`index - 1`): ATR above its moving
/// average, body larger than `body_factor × ATR`, and the candle moved against
/// the day's sentiment. Entry is in the sentiment direction.
pub struct VolatilityClusterReversal {
    descriptor: StrategyDescriptor,
    atr_period: usize,
    atr_ma_period: usize,
    body_factor: f64,
}

impl VolatilityClusterReversal {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("atr_period", Decimal::from(14))
            .with_param("atr_ma_period", Decimal::from(20))
            .with_param("body_factor", Decimal::new(15, 1))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            atr_period: descriptor.period_or("atr_period", 14),
            atr_ma_period: descriptor.period_or("atr_ma_period", 20),
            body_factor: threshold(&descriptor, "body_factor", 1.5),
            descriptor,
        }
    }
}

impl StrategyEvaluator for VolatilityClusterReversal {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.atr_ma_period
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < self.atr_ma_period {
            return None;
        }
        let last = index - 1;
        let atr = at(&frame.atr(self.atr_period), last)?;
        let atr_ma = at(&frame.atr_sma(self.atr_period, self.atr_ma_period), last)?;

        let open = frame.opens()[last];
        let close = frame.closes()[last];
        let high_volatility = atr > atr_ma;
        let large_move = (open - close).abs() > atr * self.body_factor;

        let reversal_candle = match frame.sentiment() {
            Sentiment::Bullish => close < open,
            Sentiment::Bearish => close > open,
        };

        (high_volatility && large_move && reversal_candle).then(|| frame.sentiment().side())
    }
}
