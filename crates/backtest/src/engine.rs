use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use optdesk_core::descriptor::{StrategyDescriptor, StrategyId};
use optdesk_core::report::BacktestReport;
use optdesk_core::traits::HistoricalDataProvider;
use optdesk_strategy::{StrategyEvaluator, StrategyLibrary};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::BacktestError;
use crate::metrics::{aggregate, WindowOutcome};
use crate::replay::{replay_window, validate_bars};
use crate::window::{validate_windows, BacktestWindow};

/// Runs strategies over many windows with at most `concurrency` windows in
/// flight. Window data is fetched on the async runtime; replay runs on the
/// blocking pool.
pub struct BacktestEngine {
    provider: Arc<dyn HistoricalDataProvider>,
    library: Arc<StrategyLibrary>,
    allow_overlap: bool,
}

impl BacktestEngine {
    #[must_use]
    pub fn new(provider: Arc<dyn HistoricalDataProvider>, library: Arc<StrategyLibrary>) -> Self {
        Self {
            provider,
            library,
            allow_overlap: false,
        }
    }

    /// Permits windows of the same symbol to overlap.
    #[must_use]
    pub const fn with_overlap(mut self, allow: bool) -> Self {
        self.allow_overlap = allow;
        self
    }

    #[must_use]
    pub fn library(&self) -> &StrategyLibrary {
        &self.library
    }

    /// Worker count for a configured concurrency level; `0` means one per
    /// available core.
    #[must_use]
    pub fn effective_concurrency(concurrency: usize) -> usize {
        if concurrency > 0 {
            return concurrency;
        }
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }

    /// Backtests one strategy over `windows`.
    ///
    /// A window whose data cannot be fetched or fails validation is recorded
    /// as a warning in the report; the others still count.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy is unknown, the windows are invalid,
    /// a worker task dies, or every window failed.
    pub async fn run(
        &self,
        descriptor: &StrategyDescriptor,
        windows: &[BacktestWindow],
        concurrency: usize,
    ) -> Result<BacktestReport, BacktestError> {
        validate_windows(windows, self.allow_overlap)?;
        let evaluator = self.library.evaluator_for(descriptor)?;
        let workers = Self::effective_concurrency(concurrency);

        info!(
            strategy = %descriptor.id(),
            windows = windows.len(),
            workers,
            "Starting backtest"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();

        for (index, window) in windows.iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let evaluator = Arc::clone(&evaluator);
            let semaphore = Arc::clone(&semaphore);
            let window = window.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return WindowOutcome::Failed {
                        window: index,
                        error: "worker pool closed".to_string(),
                    };
                };
                run_window(index, window, provider.as_ref(), evaluator).await
            });
        }

        let mut outcomes = Vec::with_capacity(windows.len());
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| BacktestError::Worker(e.to_string()))?;
            if let WindowOutcome::Failed { window, error } = &outcome {
                warn!(strategy = %descriptor.id(), window, error = %error, "Backtest window failed");
            }
            outcomes.push(outcome);
        }

        let report = aggregate(descriptor.id(), outcomes)?;
        info!(
            strategy = %report.strategy,
            trades = report.trade_count,
            win_rate = report.win_rate,
            total_pnl = %report.total_pnl,
            windows_failed = report.windows_failed,
            "Backtest complete"
        );
        Ok(report)
    }

    /// Backtests each descriptor in turn, keyed by strategy id. A failure of
    /// one strategy does not stop the others.
    pub async fn run_many(
        &self,
        descriptors: &[StrategyDescriptor],
        windows: &[BacktestWindow],
        concurrency: usize,
    ) -> HashMap<StrategyId, Result<BacktestReport, BacktestError>> {
        let mut reports = HashMap::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let result = self.run(descriptor, windows, concurrency).await;
            if let Err(e) = &result {
                warn!(strategy = %descriptor.id(), error = %e, "Strategy backtest failed");
            }
            reports.insert(descriptor.id().clone(), result);
        }
        reports
    }
}

async fn run_window(
    index: usize,
    window: BacktestWindow,
    provider: &dyn HistoricalDataProvider,
    evaluator: Arc<dyn StrategyEvaluator>,
) -> WindowOutcome {
    let bars = match provider
        .fetch(&window.symbol, window.start, window.end, window.interval)
        .await
    {
        Ok(bars) => bars,
        Err(e) => {
            return WindowOutcome::Failed {
                window: index,
                error: e.to_string(),
            }
        }
    };

    if let Err(reason) = validate_bars(&bars) {
        return WindowOutcome::Failed {
            window: index,
            error: format!("corrupt data for {}: {reason}", window.symbol),
        };
    }
    debug!(window = index, symbol = %window.symbol, bars = bars.len(), "Replaying window");

    let replay = tokio::task::spawn_blocking(move || {
        replay_window(index, &window, &bars, evaluator.as_ref())
    })
    .await;

    match replay {
        Ok(trades) => WindowOutcome::Completed {
            window: index,
            trades,
        },
        Err(e) => WindowOutcome::Failed {
            window: index,
            error: format!("replay failed: {e}"),
        },
    }
}
