use optdesk_core::descriptor::StrategyDescriptor;
use optdesk_core::events::Side;
use rust_decimal::prelude::ToPrimitive;

use crate::session::SessionFrame;

/// A stateless, pure trading rule evaluated bar by bar over a session.
///
/// Implementations hold only their parameters, so one instance is shared via
/// `Arc` across every backtest worker.
pub trait StrategyEvaluator: Send + Sync {
    fn descriptor(&self) -> &StrategyDescriptor;

    /// Bars at the start of each session that are never evaluated.
    fn warmup_bars(&self) -> usize;

    /// Side to enter at bar `index`, if the rule fires there.
    fn entry_signal(&self, frame: &SessionFrame<'_>, index: usize) -> Option<Side>;

    /// Whether a position on `side` should be closed at bar `index`.
    ///
    /// Default: close crosses the previous session's pivot against the
    /// position.
    fn exit_signal(&self, frame: &SessionFrame<'_>, index: usize, side: Side) -> bool {
        pivot_cross_exit(frame, index, side)
    }
}

/// Long exits when close falls below the pivot, short when it rises above.
#[must_use]
pub fn pivot_cross_exit(frame: &SessionFrame<'_>, index: usize, side: Side) -> bool {
    let Some(bar) = frame.bars().get(index) else {
        return false;
    };
    let pivot = frame.levels().pivot;
    match side {
        Side::Long => bar.close < pivot,
        Side::Short => bar.close > pivot,
    }
}

/// Reads a float threshold from the descriptor, falling back to `default`.
pub(crate) fn threshold(descriptor: &StrategyDescriptor, name: &str, default: f64) -> f64 {
    descriptor
        .param(name)
        .and_then(|v| v.to_f64())
        .unwrap_or(default)
}

/// Value of `series` at `index`, `None` while it is still warming up.
pub(crate) fn at(series: &[f64], index: usize) -> Option<f64> {
    series.get(index).copied().filter(|v| !v.is_nan())
}
