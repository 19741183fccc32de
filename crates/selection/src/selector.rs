use std::cmp::Ordering;

use optdesk_core::config::SelectionConfig;
use optdesk_core::descriptor::{StrategyDescriptor, StrategyId};
use optdesk_core::position_sizing::{size_by_drawdown, SizingParams};
use optdesk_core::report::BacktestReport;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub win_rate_threshold: f64,
    pub min_trades: usize,
}

impl From<&SelectionConfig> for SelectionCriteria {
    fn from(config: &SelectionConfig) -> Self {
        Self {
            win_rate_threshold: config.win_rate_threshold,
            min_trades: config.min_trades,
        }
    }
}

/// A strategy that was backtested today, with its report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub descriptor: StrategyDescriptor,
    pub report: BacktestReport,
}

impl Candidate {
    #[must_use]
    pub const fn new(descriptor: StrategyDescriptor, report: BacktestReport) -> Self {
        Self { descriptor, report }
    }

    #[must_use]
    pub fn id(&self) -> &StrategyId {
        self.descriptor.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoTradeReason {
    /// The agent produced no recommendation.
    RecommendationUnavailable,
    /// The recommended strategy could not be backtested and no competitor
    /// qualified.
    InsufficientData,
    /// Nothing cleared the win-rate and trade-count bars.
    BelowThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectionReason {
    Recommended,
    /// A competitor replaced the recommendation.
    Fallback { recommended: StrategyId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectionDecision {
    Trade {
        descriptor: StrategyDescriptor,
        report: BacktestReport,
        lots: u32,
        quantity: u32,
        reason: SelectionReason,
    },
    NoTrade {
        reason: NoTradeReason,
    },
}

impl SelectionDecision {
    #[must_use]
    pub const fn is_trade(&self) -> bool {
        matches!(self, Self::Trade { .. })
    }

    #[must_use]
    pub const fn descriptor(&self) -> Option<&StrategyDescriptor> {
        match self {
            Self::Trade { descriptor, .. } => Some(descriptor),
            Self::NoTrade { .. } => None,
        }
    }
}

/// Picks today's strategy from backtest reports and sizes the entry.
pub struct SelectionPolicy {
    criteria: SelectionCriteria,
    sizing: SizingParams,
}

impl SelectionPolicy {
    #[must_use]
    pub const fn new(criteria: SelectionCriteria, sizing: SizingParams) -> Self {
        Self { criteria, sizing }
    }

    #[must_use]
    pub const fn criteria(&self) -> &SelectionCriteria {
        &self.criteria
    }

    #[must_use]
    pub fn qualifies(&self, report: &BacktestReport) -> bool {
        report.meets(self.criteria.win_rate_threshold, self.criteria.min_trades)
    }

    /// Chooses the recommended strategy if its report qualifies, otherwise the
    /// best qualifying competitor.
    ///
    /// `candidates` holds every strategy whose backtest succeeded; a
    /// recommended strategy missing from it is treated as having failed.
    #[must_use]
    pub fn select(
        &self,
        recommended: Option<&StrategyDescriptor>,
        candidates: &[Candidate],
    ) -> SelectionDecision {
        let Some(recommended) = recommended else {
            info!("No recommendation, standing aside");
            return SelectionDecision::NoTrade {
                reason: NoTradeReason::RecommendationUnavailable,
            };
        };

        let own = candidates.iter().find(|c| c.id() == recommended.id());
        if let Some(candidate) = own.filter(|c| self.qualifies(&c.report)) {
            info!(
                strategy = %candidate.id(),
                win_rate = candidate.report.win_rate,
                trades = candidate.report.trade_count,
                "Recommended strategy qualifies"
            );
            return self.trade(candidate, SelectionReason::Recommended);
        }

        let best = candidates
            .iter()
            .filter(|c| c.id() != recommended.id() && self.qualifies(&c.report))
            .min_by(|a, b| rank(a, b));

        if let Some(candidate) = best {
            info!(
                strategy = %candidate.id(),
                recommended = %recommended.id(),
                win_rate = candidate.report.win_rate,
                "Falling back to competitor"
            );
            return self.trade(
                candidate,
                SelectionReason::Fallback {
                    recommended: recommended.id().clone(),
                },
            );
        }

        let reason = if own.is_some() {
            NoTradeReason::BelowThreshold
        } else {
            NoTradeReason::InsufficientData
        };
        info!(recommended = %recommended.id(), ?reason, "No strategy qualifies");
        SelectionDecision::NoTrade { reason }
    }

    fn trade(&self, candidate: &Candidate, reason: SelectionReason) -> SelectionDecision {
        // Sizing never goes below one lot, even past the risk budget.
        let size = size_by_drawdown(candidate.report.max_drawdown, &self.sizing);
        if size.over_budget {
            warn!(
                strategy = %candidate.id(),
                max_drawdown = %candidate.report.max_drawdown,
                risk_budget = %self.sizing.risk_budget,
                lot_size = self.sizing.lot_size,
                "One lot exceeds the risk budget, trading the minimum size"
            );
        }
        SelectionDecision::Trade {
            descriptor: candidate.descriptor.clone(),
            report: candidate.report.clone(),
            lots: size.lots,
            quantity: size.quantity,
            reason,
        }
    }
}

/// Best first: higher win rate, higher average P/L, lower drawdown, then id.
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.report
        .win_rate
        .total_cmp(&a.report.win_rate)
        .then_with(|| b.report.average_pnl.cmp(&a.report.average_pnl))
        .then_with(|| a.report.max_drawdown.cmp(&b.report.max_drawdown))
        .then_with(|| a.id().cmp(b.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use optdesk_core::descriptor::InstrumentClass;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn candidate(id: &str, wins: usize, trades: usize, average: Decimal, drawdown: Decimal) -> Candidate {
        #[allow(clippy::cast_precision_loss)]
        let win_rate = wins as f64 / trades as f64;
        Candidate::new(
            StrategyDescriptor::new(id, InstrumentClass::IndexOption),
            BacktestReport {
                strategy: StrategyId::new(id),
                trade_count: trades,
                wins,
                losses: trades - wins,
                breakevens: 0,
                win_rate,
                total_pnl: average * Decimal::from(trades),
                average_pnl: average,
                max_drawdown: drawdown,
                windows_evaluated: 3,
                windows_failed: 0,
                warnings: Vec::new(),
            },
        )
    }

    fn policy(threshold: f64, min_trades: usize) -> SelectionPolicy {
        SelectionPolicy::new(
            SelectionCriteria {
                win_rate_threshold: threshold,
                min_trades,
            },
            SizingParams {
                risk_budget: dec!(10000),
                lot_size: 25,
                max_lots: 4,
            },
        )
    }

    fn chosen(decision: &SelectionDecision) -> &str {
        decision.descriptor().map(|d| d.id().as_str()).unwrap_or("none")
    }

    #[test]
    fn qualifying_recommendation_is_selected() {
        let rec = candidate("ema_cross_rsi", 7, 10, dec!(3), dec!(40));
        let decision = policy(0.65, 8).select(Some(&rec.descriptor), &[rec.clone()]);

        match decision {
            SelectionDecision::Trade {
                lots,
                quantity,
                reason,
                ..
            } => {
                assert_eq!(reason, SelectionReason::Recommended);
                assert_eq!(lots, 4);
                assert_eq!(quantity, 100);
            }
            SelectionDecision::NoTrade { reason } => panic!("unexpected no-trade: {reason:?}"),
        }
    }

    #[test]
    fn weak_recommendation_falls_back_to_competitor() {
        let rec = candidate("cpr_breakout", 5, 10, dec!(1), dec!(20));
        let other = candidate("rsi_divergence", 8, 10, dec!(2), dec!(100));
        let candidates = vec![rec.clone(), candidate("ma_crossover", 3, 12, dec!(4), dec!(10)), other];
        let decision = policy(0.65, 8).select(Some(&rec.descriptor), &candidates);

        assert_eq!(chosen(&decision), "rsi_divergence");
        let SelectionDecision::Trade { reason, lots, .. } = decision else {
            panic!("expected a trade");
        };
        assert_eq!(
            reason,
            SelectionReason::Fallback {
                recommended: StrategyId::new("cpr_breakout")
            }
        );
        // 10000 / (100 * 25) = 4
        assert_eq!(lots, 4);
    }

    #[test]
    fn drawdown_beyond_budget_still_trades_one_lot() {
        // one lot risks 1000 × 25 = 25000 against a 10000 budget
        let rec = candidate("supertrend_macd", 8, 10, dec!(3), dec!(1000));
        let decision = policy(0.65, 8).select(Some(&rec.descriptor), &[rec.clone()]);

        let SelectionDecision::Trade { lots, quantity, .. } = decision else {
            panic!("expected a trade");
        };
        assert_eq!((lots, quantity), (1, 25));
    }

    #[test]
    fn too_few_trades_disqualifies() {
        let rec = candidate("cpr_breakout", 7, 7, dec!(5), dec!(10));
        let decision = policy(0.65, 8).select(Some(&rec.descriptor), &[rec.clone()]);
        assert_eq!(
            decision,
            SelectionDecision::NoTrade {
                reason: NoTradeReason::BelowThreshold
            }
        );
    }

    #[test]
    fn tie_breaks_are_deterministic() {
        let rec = candidate("cpr_breakout", 1, 10, dec!(0), dec!(0));
        let policy = policy(0.6, 5);

        let by_average = [
            candidate("a", 8, 10, dec!(1), dec!(5)),
            candidate("b", 8, 10, dec!(2), dec!(50)),
        ];
        assert_eq!(chosen(&policy.select(Some(&rec.descriptor), &by_average)), "b");

        let by_drawdown = [
            candidate("a", 8, 10, dec!(2), dec!(30)),
            candidate("b", 8, 10, dec!(2), dec!(20)),
        ];
        assert_eq!(chosen(&policy.select(Some(&rec.descriptor), &by_drawdown)), "b");

        let by_id = [
            candidate("b", 8, 10, dec!(2), dec!(20)),
            candidate("a", 8, 10, dec!(2), dec!(20)),
        ];
        assert_eq!(chosen(&policy.select(Some(&rec.descriptor), &by_id)), "a");
    }

    #[test]
    fn missing_recommendation_means_no_trade() {
        let other = candidate("rsi_divergence", 9, 10, dec!(2), dec!(10));
        assert_eq!(
            policy(0.5, 1).select(None, &[other]),
            SelectionDecision::NoTrade {
                reason: NoTradeReason::RecommendationUnavailable
            }
        );
    }

    #[test]
    fn failed_recommendation_backtest_is_insufficient_data() {
        let rec = StrategyDescriptor::new("cpr_breakout", InstrumentClass::IndexOption);
        let weak = candidate("ma_crossover", 2, 10, dec!(1), dec!(10));
        assert_eq!(
            policy(0.65, 8).select(Some(&rec), &[weak.clone()]),
            SelectionDecision::NoTrade {
                reason: NoTradeReason::InsufficientData
            }
        );

        // A qualifying competitor still trades
        let strong = candidate("ma_crossover", 9, 10, dec!(1), dec!(10));
        assert_eq!(chosen(&policy(0.65, 8).select(Some(&rec), &[strong])), "ma_crossover");
    }
}
