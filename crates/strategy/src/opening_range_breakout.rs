use chrono::Duration;
use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
use optdesk_core::events::Side;
use rust_decimal::Decimal;

use crate::evaluator::{at, threshold, StrategyEvaluator};
use crate::session::{SessionFrame, Sentiment};

pub const ID: &str = "opening_range_breakout";

/// Close crossing the high (bullish) or low (bearish) of the session's first
/// `orb_minutes` on above-average volume.
///
/// The range is measured from the first bar of the session and is only
/// traded once it is complete and at least `min_range` points wide, since
/// the far side of the range is the natural stop.
pub struct OpeningRangeBreakout {
    descriptor: StrategyDescriptor,
    orb_minutes: usize,
    min_range: f64,
    volume_period: usize,
    volume_factor: f64,
}

impl OpeningRangeBreakout {
    #[must_use]
    pub fn default_descriptor() -> StrategyDescriptor {
        StrategyDescriptor::new(ID, InstrumentClass::IndexOption)
            .with_param("orb_minutes", Decimal::from(30))
            .with_param("min_range", Decimal::from(10))
            .with_param("volume_period", Decimal::from(20))
            .with_param("volume_factor", Decimal::new(15, 1))
    }

    #[must_use]
    pub fn new(descriptor: StrategyDescriptor) -> Self {
        Self {
            orb_minutes: descriptor.period_or("orb_minutes", 30),
            min_range: threshold(&descriptor, "min_range", 10.0),
            volume_period: descriptor.period_or("volume_period", 20),
            volume_factor: threshold(&descriptor, "volume_factor", 1.5),
            descriptor,
        }
    }

    /// Bars inside the opening range, `None` while `index` is still in it.
    fn range_len(&self, frame: &SessionFrame<'_>, index: usize) -> Option<usize> {
        let bars = frame.bars();
        let minutes = i64::try_from(self.orb_minutes).ok()?;
        let end = bars.first()?.timestamp + Duration::minutes(minutes);
        if bars.get(index)?.timestamp < end {
            return None;
        }
        Some(bars.iter().take_while(|bar| bar.timestamp < end).count())
    }
}

impl StrategyEvaluator for OpeningRangeBreakout {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    fn warmup_bars(&self) -> usize {
        self.volume_period
    }

    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
        if index < 1 {
            return None;
        }
        let len = self.range_len(frame, index)?;
        let high = frame.highs()[..len].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let low = frame.lows()[..len].iter().copied().fold(f64::INFINITY, f64::min);
        if high - low < self.min_range {
            return None;
        }

        let volume_ma = at(&frame.volume_sma(self.volume_period), index)?;
        if frame.volumes()[index] <= volume_ma * self.volume_factor {
            return None;
        }

        let closes = frame.closes();
        let (close, prev_close) = (closes[index], closes[index - 1]);
        let fired = match frame.sentiment() {
            Sentiment::Bullish => prev_close < high && close > high,
            Sentiment::Bearish => prev_close > low && close < low,
        };
        fired.then(|| frame.sentiment().side())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bars, bearish, bullish};

    /// Six five-minute bars spanning 100..112, then a quiet drift at 106.
    fn session(range_low: f64, last: (f64, f64, f64, f64, u64)) -> Vec<(f64, f64, f64, f64, u64)> {
        let mut rows = vec![(106.0, 112.0, range_low, 106.0, 1_000); 6];
        rows.extend(vec![(106.0, 106.5, 105.5, 106.0, 1_000); 19]);
        rows.push(last);
        rows
    }

    #[test]
    fn breakout_above_opening_high_buys() {
        let bars = bars(&session(100.0, (106.0, 113.5, 106.0, 113.0, 3_000)));
        let strategy = OpeningRangeBreakout::new(OpeningRangeBreakout::default_descriptor());
        let frame = SessionFrame::new(&bars, bullish());

        assert_eq!(strategy.entry_signal(&frame, 25), Some(Side::Long));
        assert_eq!(strategy.entry_signal(&frame, 3), None);

        let frame = SessionFrame::new(&bars, bearish());
        assert_eq!(strategy.entry_signal(&frame, 25), None);
    }

    #[test]
    fn breakdown_below_opening_low_sells() {
        let bars = bars(&session(100.0, (106.0, 106.0, 99.0, 99.5, 3_000)));
        let strategy = OpeningRangeBreakout::new(OpeningRangeBreakout::default_descriptor());
        let frame = SessionFrame::new(&bars, bearish());
        assert_eq!(strategy.entry_signal(&frame, 25), Some(Side::Short));
    }

    #[test]
    fn narrow_range_is_not_traded() {
        // 104..112 is eight points
        let bars = bars(&session(104.0, (106.0, 113.5, 106.0, 113.0, 3_000)));
        let strategy = OpeningRangeBreakout::new(OpeningRangeBreakout::default_descriptor());
        let frame = SessionFrame::new(&bars, bullish());
        assert_eq!(strategy.entry_signal(&frame, 25), None);

        let wide_enough = OpeningRangeBreakout::default_descriptor().with_param("min_range", Decimal::from(8));
        let strategy = OpeningRangeBreakout::new(wide_enough);
        assert_eq!(strategy.entry_signal(&frame, 25), Some(Side::Long));
    }

    #[test]
    fn longer_window_includes_later_bars() {
        // 45 minutes takes in the 09:45 bar that reached 113.5, so 113 stays inside
        let mut rows = session(100.0, (106.0, 113.5, 106.0, 113.0, 3_000));
        rows[6] = (106.0, 113.5, 106.0, 106.0, 1_000);
        let bars = bars(&rows);
        let descriptor = OpeningRangeBreakout::default_descriptor().with_param("orb_minutes", Decimal::from(45));
        let strategy = OpeningRangeBreakout::new(descriptor);
        let frame = SessionFrame::new(&bars, bullish());
        assert_eq!(strategy.entry_signal(&frame, 25), None);
    }
}
