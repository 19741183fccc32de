//! Single-window replay. Pure and synchronous; runs on a blocking worker.

use chrono::{DateTime, Utc};
use optdesk_core::events::{Bar, Side};
use optdesk_core::report::{ExitReason, TradeSimResult};
use optdesk_strategy::{split_sessions, SessionContext, SessionFrame, StrategyEvaluator};
use rust_decimal::Decimal;

use crate::window::BacktestWindow;

/// Rejects bar series the replay cannot trust.
///
/// # Errors
///
/// Returns a description of the first problem: empty series, non-increasing
/// timestamps, `high < low`, or a non-positive price.
pub fn validate_bars(bars: &[Bar]) -> Result<(), String> {
    if bars.is_empty() {
        return Err("no bars".to_string());
    }
    for (i, bar) in bars.iter().enumerate() {
        if bar.high < bar.low {
            return Err(format!("bar {i} at {}: high below low", bar.timestamp));
        }
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| *p <= Decimal::ZERO) {
            return Err(format!("bar {i} at {}: non-positive price", bar.timestamp));
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(format!("bar {i} at {}: timestamp not increasing", bar.timestamp));
        }
    }
    Ok(())
}

struct OpenTrade {
    side: Side,
    entry_price: Decimal,
    entry_time: DateTime<Utc>,
}

/// Replays every session of a window against `evaluator`.
///
/// The first session only seeds pivots and sentiment. At most one simulated
/// position is open at a time; a position still open at a session's last bar
/// is closed at that bar's close.
#[must_use]
pub fn replay_window(
    index: usize,
    window: &BacktestWindow,
    bars: &[Bar],
    evaluator: &dyn StrategyEvaluator,
) -> Vec<TradeSimResult> {
    let sessions = split_sessions(bars);
    let mut trades = Vec::new();

    for pair in sessions.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        let Some(context) = SessionContext::from_previous(current[0].session_date(), previous)
        else {
            continue;
        };
        let frame = SessionFrame::new(current, context);
        replay_session(index, &window.symbol, &frame, evaluator, &mut trades);
    }
    trades
}

fn replay_session(
    window: usize,
    symbol: &str,
    frame: &SessionFrame<'_>,
    evaluator: &dyn StrategyEvaluator,
    trades: &mut Vec<TradeSimResult>,
) {
    let bars = frame.bars();
    let mut open: Option<OpenTrade> = None;

    for index in evaluator.warmup_bars()..bars.len() {
        let bar = &bars[index];

        if let Some(trade) = &open {
            if evaluator.exit_signal(frame, index, trade.side) {
                trades.push(TradeSimResult::close(
                    window,
                    symbol,
                    trade.side,
                    trade.entry_price,
                    trade.entry_time,
                    bar.close,
                    bar.timestamp,
                    ExitReason::Signal,
                ));
                open = None;
            }
        }

        if open.is_none() {
            if let Some(side) = evaluator.entry_signal(frame, index) {
                open = Some(OpenTrade {
                    side,
                    entry_price: bar.close,
                    entry_time: bar.timestamp,
                });
            }
        }
    }

    if let (Some(trade), Some(last)) = (open, bars.last()) {
        trades.push(TradeSimResult::close(
            window,
            symbol,
            trade.side,
            trade.entry_price,
            trade.entry_time,
            last.close,
            last.timestamp,
            ExitReason::SessionEnd,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use optdesk_core::descriptor::{InstrumentClass, StrategyDescriptor};
    use optdesk_core::events::BarInterval;
    use optdesk_core::report::TradeOutcome;
    use rust_decimal_macros::dec;

    /// Enters long on bar 1 of every session; exits on the default pivot rule.
    struct EnterOnSecondBar(StrategyDescriptor);

    impl StrategyEvaluator for EnterOnSecondBar {
        fn descriptor(&self) -> &StrategyDescriptor {
            &self.0
        }

        fn warmup_bars(&self) -> usize {
            1
        }

        fn entry_signal(&self, _frame: &SessionFrame<'_>, index: usize) -> Option<Side> {
            (index == 1).then_some(Side::Long)
        }
    }

    fn session(day: u32, closes: &[Decimal]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, day, 3, 45, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Bar::new(start + Duration::minutes(5 * i as i64), *c, *c + dec!(1), *c - dec!(1), *c, 100)
            })
            .collect()
    }

    fn window() -> BacktestWindow {
        BacktestWindow::new(
            "NIFTY 50",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            BarInterval::Minute5,
        )
    }

    fn evaluator() -> EnterOnSecondBar {
        EnterOnSecondBar(StrategyDescriptor::new("test", InstrumentClass::IndexOption))
    }

    #[test]
    fn first_session_only_seeds_context() {
        let bars = session(2, &[dec!(100), dec!(101), dec!(102)]);
        assert!(replay_window(0, &window(), &bars, &evaluator()).is_empty());
    }

    #[test]
    fn pivot_cross_exit_and_session_end_close() {
        // Day 1: H 111, L 99, C 110 -> pivot 106.67
        let mut bars = session(2, &[dec!(100), dec!(110)]);
        // Day 2: enter at 108, close below pivot at 105
        bars.extend(session(3, &[dec!(107), dec!(108), dec!(109), dec!(105), dec!(104)]));
        // Day 3: pivot from day 2 (H 110, L 103, C 104) = 105.67; enter 107, never crosses
        bars.extend(session(4, &[dec!(106), dec!(107), dec!(108), dec!(111)]));

        let trades = replay_window(2, &window(), &bars, &evaluator());
        assert_eq!(trades.len(), 2);

        assert_eq!(trades[0].window, 2);
        assert_eq!(trades[0].entry_price, dec!(108));
        assert_eq!(trades[0].exit_price, dec!(105));
        assert_eq!(trades[0].exit_reason, ExitReason::Signal);
        assert_eq!(trades[0].outcome, TradeOutcome::Loss);

        assert_eq!(trades[1].entry_price, dec!(107));
        assert_eq!(trades[1].exit_price, dec!(111));
        assert_eq!(trades[1].exit_reason, ExitReason::SessionEnd);
        assert_eq!(trades[1].pnl, dec!(4));
    }

    #[test]
    fn validation_rejects_bad_series() {
        assert!(validate_bars(&[]).is_err());

        let mut bars = session(2, &[dec!(100), dec!(101)]);
        assert!(validate_bars(&bars).is_ok());

        bars[1].timestamp = bars[0].timestamp;
        assert!(validate_bars(&bars).is_err());

        let mut bars = session(2, &[dec!(100)]);
        bars[0].low = dec!(200);
        assert!(validate_bars(&bars).is_err());

        let bars = session(2, &[dec!(0.5)]);
        assert!(validate_bars(&bars).is_err());
    }
}
