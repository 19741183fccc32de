use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;

use crate::evaluator::{at, threshold, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "cpr_breakout";

/// Central pivot range breakout in the direction of the day's sentiment,
/// confirmed by at least one of trend (close vs EMA) or momentum (RSI).
///
/// **Primary**: two consecutive closes above `tc` (bullish) or below `bc`
/// (bearish).
/// **Confirmations**: close beyond `EMA(ema_period)`; RSI above `rsi_bull` /
/// below `rsi_bear`.
pub struct CprBreakout {
    descriptor: StrategyDescriptor,
    ema_period: usize,
    rsi_period: usize,
    rsi_bull: f64,
    rsi_bear: f64,
}

impl CprBreakout {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("ema_period", Decimal::from(50))
            .with_param("rsi_period", Decimal::from(14))
            .with_param("rsi_bull", Decimal::from(55))
            .with_param("rsi_bear", Decimal::from(45))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            ema_period: descriptor.period_or("ema_period", 50),
            rsi_period: descriptor.period_or("rsi_period", 14),
            rsi_bull: threshold(&descriptor, "rsi_bull", 55.0),
            rsi_bear: threshold(&descriptor, "rsi_bear", 45.0),
            descriptor,
        }
    }
}

impl StrategyEvaluator for CprBreakout {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.rsi_period + 1
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < 1 || index >= frame.len() {
            return None;
        }
        let bars = frame.bars();
        let (close, prev_close) = (bars[index].close, bars[index - 1].close);
        let levels = frame.levels();
        let sentiment = frame.sentiment();

        let breakout = match sentiment {
            Sentiment::Bullish => close > levels.tc && prev_close > levels.tc,
            Sentiment::Bearish => close < levels.bc && prev_close < levels.bc,
        };
        if !breakout {
            return None;
        }

        let close_f = frame.closes()[index];
        let ema = at(&frame.ema(self.ema_period), index);
        let rsi = at(&frame.rsi(self.rsi_period), index);

        let confirmations = match sentiment {
            Sentiment::Bullish => [
                ema.is_some_and(|e| close_f > e),
                rsi.is_some_and(|r| r > self.rsi_bull),
            ],
            Sentiment::Bearish => [
                ema.is_some_and(|e| close_f < e),
                rsi.is_some_and(|r| r < self.rsi_bear),
            ],
        };

        confirmations
            .iter()
            .any(|met| *met)
            .then(|| sentiment.side())
    }
}
