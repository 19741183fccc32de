pub mod config;
pub mod config_loader;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod metrics_formatter;
pub mod position;
pub mod position_sizing;
pub mod report;
pub mod traits;

pub use config::{
    AppConfig, BacktestConfig, ExecutionConfig, RiskConfig, SelectionConfig, TradingConfig,
};
pub use config_loader::ConfigLoader;
pub use context::{DailyContext, Recommendation};
pub use descriptor::{InstrumentClass, StrategyDescriptor, StrategyId};
pub use error::{BrokerError, ConfigError, DataError};
pub use events::{
    Bar, BarInterval, FillEvent, Order, OrderId, OrderIntent, OrderSide, OrderStatus, OrderType,
    OrderUpdate, QuoteTick, Side,
};
pub use metrics_formatter::MetricsFormatter;
pub use position::{CloseReason, Position, PositionState};
pub use position_sizing::{size_by_drawdown, PositionSize, SizingParams};
pub use report::{BacktestReport, ExitReason, TradeOutcome, TradeSimResult};
pub use traits::{
    Broker, HistoricalDataProvider, LogReportSink, RecommendationAgent, ReportSink,
    StaticRecommendationAgent,
};
