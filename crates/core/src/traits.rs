use crate::context::{DailyContext, Recommendation};
use crate::error::{BrokerError, DataError};
use crate::events::{Bar, BarInterval, FillEvent, Order, OrderId, OrderIntent, OrderUpdate, QuoteTick};
use crate::position::Position;
use crate::report::BacktestReport;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::BoxStream;
use tracing::info;

/// Source of historical bars for backtesting.
#[async_trait]
pub trait HistoricalDataProvider: Send + Sync {
    /// Bars for `symbol` with session dates in `[start, end]`, ascending.
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: BarInterval,
    ) -> Result<Vec<Bar>, DataError>;
}

/// Opaque oracle proposing the day's strategy.
#[async_trait]
pub trait RecommendationAgent: Send + Sync {
    /// `None` when the agent has nothing to offer (timeout, malformed answer).
    async fn recommend(&self, context: &DailyContext) -> Option<Recommendation>;
}

/// Order transport plus quote, fill and order-status feeds.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn submit_order(&self, intent: &OrderIntent) -> Result<Order, BrokerError>;

    async fn cancel_order(&self, order_id: &OrderId) -> Result<(), BrokerError>;

    /// Live premium ticks for one instrument.
    async fn quote_stream(
        &self,
        instrument: &str,
    ) -> Result<BoxStream<'static, QuoteTick>, BrokerError>;

    /// Every execution on the account, in broker order.
    async fn fill_stream(&self) -> Result<BoxStream<'static, FillEvent>, BrokerError>;

    /// Rejections and cancellations that happen after an order was
    /// acknowledged, including confirmations of requested cancels.
    async fn order_stream(&self) -> Result<BoxStream<'static, OrderUpdate>, BrokerError>;
}

/// Reporting destination for finished positions and backtests.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn position_closed(&self, position: &Position);

    async fn backtest_completed(&self, report: &BacktestReport);
}

/// Always recommends the same strategy.
pub struct StaticRecommendationAgent {
    recommendation: Option<Recommendation>,
}

impl StaticRecommendationAgent {
    #[must_use]
    pub const fn new(recommendation: Recommendation) -> Self {
        Self {
            recommendation: Some(recommendation),
        }
    }

    /// An agent that never answers.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            recommendation: None,
        }
    }
}

#[async_trait]
impl RecommendationAgent for StaticRecommendationAgent {
    async fn recommend(&self, _context: &DailyContext) -> Option<Recommendation> {
        self.recommendation.clone()
    }
}

/// Writes reports as structured log records.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReportSink;

#[async_trait]
impl ReportSink for LogReportSink {
    async fn position_closed(&self, position: &Position) {
        info!(
            instrument = %position.instrument,
            side = %position.side,
            state = %position.state,
            quantity = position.filled_quantity,
            entry = ?position.entry_premium,
            exit = ?position.exit_premium,
            pnl = ?position.realized_pnl,
            reason = ?position.close_reason,
            "Position finished"
        );
    }

    async fn backtest_completed(&self, report: &BacktestReport) {
        info!(
            strategy = %report.strategy,
            trades = report.trade_count,
            win_rate = report.win_rate,
            total_pnl = %report.total_pnl,
            max_drawdown = %report.max_drawdown,
            failed_windows = report.windows_failed,
            "Backtest completed"
        );
    }
}
