use optdesk_core::descriptor::StrategyId;
use optdesk_core::report::{BacktestReport, TradeOutcome, TradeSimResult};
use rust_decimal::Decimal;

use crate::error::BacktestError;

/// Running totals over a sequence of simulated trades.
///
/// The equity curve starts at zero and moves by each trade's P/L, so drawdown
/// is measured in premium points rather than as a fraction of capital.
pub struct MetricsCalculator {
    equity_curve: Vec<Decimal>,
    wins: usize,
    losses: usize,
    breakevens: usize,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            equity_curve: vec![Decimal::ZERO],
            wins: 0,
            losses: 0,
            breakevens: 0,
        }
    }

    pub fn add_trade(&mut self, trade: &TradeSimResult) {
        let current = self.equity_curve.last().copied().unwrap_or_default();
        self.equity_curve.push(current + trade.pnl);

        match trade.outcome {
            TradeOutcome::Win => self.wins += 1,
            TradeOutcome::Loss => self.losses += 1,
            TradeOutcome::Breakeven => self.breakevens += 1,
        }
    }

    #[must_use]
    pub fn trade_count(&self) -> usize {
        self.wins + self.losses + self.breakevens
    }

    #[must_use]
    pub fn total_pnl(&self) -> Decimal {
        self.equity_curve.last().copied().unwrap_or_default()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn win_rate(&self) -> f64 {
        let count = self.trade_count();
        if count == 0 {
            0.0
        } else {
            self.wins as f64 / count as f64
        }
    }

    #[must_use]
    pub fn average_pnl(&self) -> Decimal {
        match self.trade_count() {
            0 => Decimal::ZERO,
            n => self.total_pnl() / Decimal::from(n),
        }
    }

    #[must_use]
    pub fn max_drawdown(&self) -> Decimal {
        let mut max_drawdown = Decimal::ZERO;
        let mut peak = Decimal::ZERO;

        for &equity in &self.equity_curve {
            if equity > peak {
                peak = equity;
            }
            max_drawdown = max_drawdown.max(peak - equity);
        }
        max_drawdown
    }
}

/// Sorts trades into the order used for the equity curve, independent of the
/// order in which windows completed.
pub fn canonical_order(trades: &mut [TradeSimResult]) {
    trades.sort_by(|a, b| {
        a.exit_time
            .cmp(&b.exit_time)
            .then_with(|| a.entry_time.cmp(&b.entry_time))
            .then_with(|| a.symbol.cmp(&b.symbol))
            .then_with(|| a.window.cmp(&b.window))
            .then_with(|| a.side.cmp(&b.side))
            .then_with(|| a.entry_price.cmp(&b.entry_price))
            .then_with(|| a.exit_price.cmp(&b.exit_price))
    });
}

/// Result of replaying one window.
#[derive(Debug, Clone)]
pub enum WindowOutcome {
    Completed {
        window: usize,
        trades: Vec<TradeSimResult>,
    },
    Failed {
        window: usize,
        error: String,
    },
}

impl WindowOutcome {
    #[must_use]
    pub const fn window(&self) -> usize {
        match self {
            Self::Completed { window, .. } | Self::Failed { window, .. } => *window,
        }
    }
}

/// Folds per-window outcomes into one report.
///
/// # Errors
///
/// Returns `InsufficientData` when there are no outcomes or every window
/// failed.
pub fn aggregate(
    strategy: &StrategyId,
    mut outcomes: Vec<WindowOutcome>,
) -> Result<BacktestReport, BacktestError> {
    outcomes.sort_by_key(WindowOutcome::window);

    let total = outcomes.len();
    let mut trades = Vec::new();
    let mut warnings = Vec::new();

    for outcome in outcomes {
        match outcome {
            WindowOutcome::Completed { trades: t, .. } => trades.extend(t),
            WindowOutcome::Failed { window, error } => {
                warnings.push(format!("window {window}: {error}"));
            }
        }
    }

    let failed = warnings.len();
    if total == 0 || failed == total {
        return Err(BacktestError::InsufficientData {
            strategy: strategy.clone(),
            failed,
            total,
        });
    }

    canonical_order(&mut trades);
    let mut calculator = MetricsCalculator::new();
    for trade in &trades {
        calculator.add_trade(trade);
    }

    Ok(BacktestReport {
        strategy: strategy.clone(),
        trade_count: calculator.trade_count(),
        wins: calculator.wins,
        losses: calculator.losses,
        breakevens: calculator.breakevens,
        win_rate: calculator.win_rate(),
        total_pnl: calculator.total_pnl(),
        average_pnl: calculator.average_pnl(),
        max_drawdown: calculator.max_drawdown(),
        windows_evaluated: total - failed,
        windows_failed: failed,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use optdesk_core::events::Side;
    use optdesk_core::report::ExitReason;
    use rust_decimal_macros::dec;

    fn trade(window: usize, minute: i64, pnl: Decimal) -> TradeSimResult {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap();
        TradeSimResult::close(
            window,
            "NIFTY 50",
            Side::Long,
            dec!(100),
            t0 + Duration::minutes(minute),
            dec!(100) + pnl,
            t0 + Duration::minutes(minute + 5),
            ExitReason::Signal,
        )
    }

    fn id() -> StrategyId {
        StrategyId::new("cpr_breakout")
    }

    #[test]
    fn seven_of_ten_wins() {
        let mut trades: Vec<_> = (0..7).map(|i| trade(0, i * 10, dec!(10))).collect();
        trades.push(trade(0, 70, dec!(-5)));
        trades.push(trade(0, 80, dec!(-5)));
        trades.push(trade(0, 90, dec!(0)));

        let report = aggregate(&id(), vec![WindowOutcome::Completed { window: 0, trades }]).unwrap();
        assert_eq!(report.trade_count, 10);
        assert_eq!((report.wins, report.losses, report.breakevens), (7, 2, 1));
        assert!((report.win_rate - 0.70).abs() < 1e-12);
        assert_eq!(report.total_pnl, dec!(60));
        assert_eq!(report.average_pnl, dec!(6));
        assert_eq!(report.max_drawdown, dec!(10));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn drawdown_measured_from_zero() {
        let trades = vec![trade(0, 0, dec!(-20)), trade(0, 10, dec!(5)), trade(0, 20, dec!(-10))];
        let report = aggregate(&id(), vec![WindowOutcome::Completed { window: 0, trades }]).unwrap();
        assert_eq!(report.max_drawdown, dec!(25));
    }

    #[test]
    fn completion_order_does_not_change_report() {
        let a = WindowOutcome::Completed {
            window: 0,
            trades: vec![trade(0, 0, dec!(12)), trade(0, 10, dec!(-30))],
        };
        let b = WindowOutcome::Completed {
            window: 1,
            trades: vec![trade(1, 1000, dec!(8)), trade(1, 1010, dec!(-4))],
        };
        let c = WindowOutcome::Failed {
            window: 2,
            error: "data unavailable".to_string(),
        };

        let forward = aggregate(&id(), vec![a.clone(), b.clone(), c.clone()]).unwrap();
        let reversed = aggregate(&id(), vec![c, b, a]).unwrap();
        assert_eq!(forward, reversed);
        assert_eq!(forward.windows_evaluated, 2);
        assert_eq!(forward.windows_failed, 1);
        assert_eq!(forward.warnings, vec!["window 2: data unavailable".to_string()]);
    }

    #[test]
    fn no_trades_is_a_valid_report() {
        let report = aggregate(&id(), vec![WindowOutcome::Completed { window: 0, trades: vec![] }])
            .unwrap();
        assert_eq!(report.trade_count, 0);
        assert!(report.win_rate.abs() < f64::EPSILON);
        assert_eq!(report.average_pnl, Decimal::ZERO);
    }

    #[test]
    fn all_failed_is_insufficient() {
        let err = aggregate(
            &id(),
            vec![WindowOutcome::Failed { window: 0, error: "x".to_string() }],
        )
        .unwrap_err();
        assert!(err.is_insufficient_data());
        assert!(aggregate(&id(), vec![]).unwrap_err().is_insufficient_data());
    }
}
