pub mod plan;
pub mod selector;

pub use plan::DailyPlan;
pub use selector::{
    Candidate, NoTradeReason, SelectionCriteria, SelectionDecision, SelectionPolicy,
    SelectionReason,
};
