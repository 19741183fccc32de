pub mod bb_squeeze;
pub mod cpr_breakout;
pub mod ema_cross_rsi;
pub mod evaluator;
pub mod indicators;
pub mod library;
pub mod ma_crossover;
pub mod momentum_vwap_rsi;
pub mod opening_range_breakout;
pub mod prev_day_breakout;
pub mod rsi_divergence;
pub mod session;
pub mod supertrend_macd;
pub mod volatility_cluster;
pub mod volume_spread;

#[cfg(test)]
pub(crate) mod test_support;

pub use bb_squeeze::BbSqueezeBreakout;
pub use cpr_breakout::CprBreakout;
pub use ema_cross_rsi::EmaCrossRsi;
pub use evaluator::{pivot_cross_exit, StrategyEvaluator};
pub use library::{EvaluatorFactory, LibraryError, StrategyLibrary};
pub use ma_crossover::MaCrossover;
pub use momentum_vwap_rsi::MomentumVwapRsi;
pub use opening_range_breakout::OpeningRangeBreakout;
pub use prev_day_breakout::PrevDayBreakout;
pub use rsi_divergence::RsiDivergence;
pub use session::{split_sessions, CprLevels, SessionContext, SessionFrame, Sentiment};
pub use supertrend_macd::SupertrendMacd;
pub use volatility_cluster::VolatilityClusterReversal;
pub use volume_spread::VolumeSpreadAnalysis;
