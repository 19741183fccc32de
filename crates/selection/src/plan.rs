use optdesk_core::context::{DailyContext, Recommendation};
use optdesk_core::descriptor::StrategyDescriptor;
use serde::{Deserialize, Serialize};

use crate::selector::{Candidate, SelectionDecision, SelectionPolicy, SelectionReason};

/// The day's pre-market state, carried through the cycle as a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPlan {
    pub context: DailyContext,
    pub recommendation: Option<Recommendation>,
    pub decision: Option<SelectionDecision>,
}

impl DailyPlan {
    #[must_use]
    pub const fn new(context: DailyContext, recommendation: Option<Recommendation>) -> Self {
        Self {
            context,
            recommendation,
            decision: None,
        }
    }

    #[must_use]
    pub fn recommended(&self) -> Option<&StrategyDescriptor> {
        self.recommendation.as_ref().map(Recommendation::descriptor)
    }

    /// Strategies to backtest today: the recommendation first, then each
    /// competitor not already listed.
    #[must_use]
    pub fn backtest_set(&self, competitors: &[StrategyDescriptor]) -> Vec<StrategyDescriptor> {
        let mut set: Vec<StrategyDescriptor> = self.recommended().cloned().into_iter().collect();
        for competitor in competitors {
            if !set.iter().any(|d| d.id() == competitor.id()) {
                set.push(competitor.clone());
            }
        }
        set
    }

    pub fn decide(&mut self, policy: &SelectionPolicy, candidates: &[Candidate]) -> &SelectionDecision {
        let decision = policy.select(self.recommended(), candidates);
        self.decision.insert(decision)
    }

    /// One-line description of the decision for logs and the CLI.
    #[must_use]
    pub fn summary(&self) -> String {
        let date = self.context.date;
        match &self.decision {
            None => format!("{date}: undecided"),
            Some(SelectionDecision::NoTrade { reason }) => format!("{date}: no trade ({reason:?})"),
            Some(SelectionDecision::Trade {
                descriptor,
                report,
                lots,
                quantity,
                reason,
            }) => {
                let via = match reason {
                    SelectionReason::Recommended => "recommended".to_string(),
                    SelectionReason::Fallback { recommended } => {
                        format!("fallback from {recommended}")
                    }
                };
                format!(
                    "{date}: trade {} ({via}), win rate {:.2}% over {} trades, {lots} lots / {quantity} contracts",
                    descriptor.id(),
                    report.win_rate * 100.0,
                    report.trade_count,
                )
            }
        }
    }
}
